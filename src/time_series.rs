use serde::{Deserialize, Serialize};

/// Instantaneous wpm recorded on a sampling tick, `time` seconds after the start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WpmSample {
    pub time: f64,
    pub wpm: u32,
}

impl WpmSample {
    pub fn new(time: f64, wpm: u32) -> Self {
        Self { time, wpm }
    }
}

impl From<WpmSample> for (f64, f64) {
    fn from(p: WpmSample) -> Self {
        (p.time, p.wpm as f64)
    }
}
