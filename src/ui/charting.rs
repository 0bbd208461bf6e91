use crate::time_series::WpmSample;

/// X (seconds) and Y (wpm) upper bounds for the results chart.
pub fn compute_chart_params(history: &[WpmSample], total_time: f64) -> (f64, f64) {
    let highest_wpm = history.iter().map(|s| s.wpm).max().unwrap_or(0) as f64;

    let overall_duration = match history.last() {
        Some(sample) => sample.time,
        None => total_time,
    };

    (overall_duration.max(1.0), highest_wpm.max(1.0))
}

pub fn chart_points(history: &[WpmSample]) -> Vec<(f64, f64)> {
    history.iter().copied().map(Into::into).collect()
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
