use chrono::{DateTime, Local};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::settings::TestSettings;
use crate::stats::TypingStats;
use crate::time_series::WpmSample;

/// A completed test. Owns copies of everything it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub settings: TestSettings,
    pub wpm_history: Vec<WpmSample>,
    #[serde(flatten)]
    pub stats: TypingStats,
}

impl TestResult {
    /// Same record, ignoring the id and timestamp assigned at assembly.
    pub fn same_content(&self, other: &TestResult) -> bool {
        self.settings == other.settings
            && self.wpm_history == other.wpm_history
            && self.stats == other.stats
    }
}

/// Receives each completed result exactly once.
pub trait ResultSink {
    fn submit(&mut self, result: &TestResult);
}

impl<F: FnMut(&TestResult)> ResultSink for F {
    fn submit(&mut self, result: &TestResult) {
        self(result)
    }
}

pub fn assemble(
    settings: &TestSettings,
    stats: &TypingStats,
    wpm_history: &[WpmSample],
) -> TestResult {
    let timestamp = Local::now();
    TestResult {
        id: new_result_id(&timestamp),
        timestamp,
        settings: *settings,
        wpm_history: wpm_history.to_vec(),
        stats: *stats,
    }
}

fn new_result_id(at: &DateTime<Local>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{}-{}", at.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Difficulty, TestMode};

    fn stats() -> TypingStats {
        TypingStats {
            wpm: 48,
            accuracy: 96,
            correct: 120,
            incorrect: 5,
            missed: 0,
            total_time: 15.0,
            char_count: 125,
        }
    }

    #[test]
    fn assemble_copies_inputs() {
        let settings = TestSettings::new(TestMode::Time, 15, Difficulty::Easy);
        let mut history = vec![WpmSample::new(1.0, 30), WpmSample::new(2.0, 40)];

        let result = assemble(&settings, &stats(), &history);
        history.push(WpmSample::new(3.0, 50));

        assert_eq!(result.wpm_history.len(), 2);
        assert_eq!(result.settings, settings);
        assert_eq!(result.stats, stats());
    }

    #[test]
    fn ids_are_unique() {
        let settings = TestSettings::default();
        let a = assemble(&settings, &stats(), &[]);
        let b = assemble(&settings, &stats(), &[]);
        assert_ne!(a.id, b.id);
        assert!(a.same_content(&b));
    }

    #[test]
    fn serializes_flat_like_the_stored_record() {
        let result = assemble(&TestSettings::default(), &stats(), &[WpmSample::new(1.0, 30)]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["wpm"], 48);
        assert_eq!(json["charCount"], 125);
        assert_eq!(json["settings"]["mode"], "time");
        assert_eq!(json["wpmHistory"][0]["wpm"], 30);

        let back: TestResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = vec![];
        {
            let mut sink = |r: &TestResult| seen.push(r.id.clone());
            let result = assemble(&TestSettings::default(), &stats(), &[]);
            sink.submit(&result);
        }
        assert_eq!(seen.len(), 1);
    }
}
