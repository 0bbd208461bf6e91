use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TYPEFLOW_LOG";
const DEFAULT_FILTER: &str = "typeflow=info";

/// Routes `tracing` output to `log_path`, appending. The terminal belongs to
/// the UI, so nothing is written to stdout or stderr. Returns false when the
/// file can't be opened or a subscriber is already installed.
pub fn init(log_path: &Path) -> bool {
    if let Some(dir) = log_path.parent() {
        if fs::create_dir_all(dir).is_err() {
            return false;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(log_path) else {
        return false;
    };

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_env_filter(filter())
        .try_init()
        .is_ok()
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
