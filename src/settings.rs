use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;

/// Word budget for time-mode prompts; generous enough that nobody runs out.
pub const TIME_MODE_WORD_BUDGET: usize = 200;

/// Durations offered by the front end for each mode. The engine accepts any positive value.
pub const TIME_OPTIONS: [u32; 4] = [15, 30, 60, 120];
pub const WORD_OPTIONS: [u32; 4] = [10, 25, 50, 100];

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TestMode {
    Time,
    Words,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Hard,
}

/// What kind of test to run. `duration` is seconds in time mode and a word count in words mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestSettings {
    pub mode: TestMode,
    pub duration: u32,
    pub difficulty: Difficulty,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            mode: TestMode::Time,
            duration: 30,
            difficulty: Difficulty::Easy,
        }
    }
}

impl TestSettings {
    pub fn new(mode: TestMode, duration: u32, difficulty: Difficulty) -> Self {
        Self {
            mode,
            duration,
            difficulty,
        }
    }

    /// Duration clamped to a positive value.
    pub fn effective_duration(&self) -> u32 {
        self.duration.max(1)
    }

    /// Number of words the prompt for these settings should contain.
    pub fn word_budget(&self) -> usize {
        match self.mode {
            TestMode::Words => self.effective_duration() as usize,
            TestMode::Time => TIME_MODE_WORD_BUDGET,
        }
    }

    /// The option set the front end cycles through for the current mode.
    pub fn duration_options(&self) -> &'static [u32] {
        match self.mode {
            TestMode::Time => &TIME_OPTIONS,
            TestMode::Words => &WORD_OPTIONS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value style store for the single persisted settings record.
pub trait SettingsStore {
    /// Never fails: malformed or missing records fall back to defaults.
    fn load(&self) -> TestSettings;
    fn save(&self, settings: &TestSettings) -> Result<(), SettingsError>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::settings_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> TestSettings {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no persisted settings, using defaults");
                return TestSettings::default();
            }
        };

        match serde_json::from_slice::<TestSettings>(&bytes) {
            Ok(settings) if settings.duration > 0 => settings,
            Ok(_) => {
                warn!(path = %self.path.display(), "persisted settings have a zero duration, using defaults");
                TestSettings::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed persisted settings, using defaults");
                TestSettings::default()
            }
        }
    }

    fn save(&self, settings: &TestSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_settings() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::with_path(dir.path().join("settings.json"));
        let settings = TestSettings::default();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn save_and_load_custom_settings() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::with_path(dir.path().join("nested").join("settings.json"));
        let settings = TestSettings::new(TestMode::Words, 50, Difficulty::Hard);
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), TestSettings::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{ \"mode\": \"sprint\", ").unwrap();
        let store = FileSettingsStore::with_path(&path);
        assert_eq!(store.load(), TestSettings::default());
    }

    #[test]
    fn zero_duration_is_treated_as_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, br#"{"mode":"words","duration":0,"difficulty":"hard"}"#).unwrap();
        let store = FileSettingsStore::with_path(&path);
        assert_eq!(store.load(), TestSettings::default());
    }

    #[test]
    fn serialized_form_uses_lowercase_names() {
        let settings = TestSettings::new(TestMode::Words, 25, Difficulty::Hard);
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"mode":"words","duration":25,"difficulty":"hard"}"#);
    }

    #[test]
    fn word_budget_depends_on_mode() {
        assert_eq!(
            TestSettings::new(TestMode::Words, 10, Difficulty::Easy).word_budget(),
            10
        );
        assert_eq!(
            TestSettings::new(TestMode::Time, 15, Difficulty::Easy).word_budget(),
            TIME_MODE_WORD_BUDGET
        );
        assert_eq!(
            TestSettings::new(TestMode::Words, 0, Difficulty::Easy).word_budget(),
            1
        );
    }

    #[test]
    fn display_matches_serde_names() {
        assert_eq!(TestMode::Time.to_string(), "time");
        assert_eq!(Difficulty::Hard.to_string(), "hard");
    }
}
