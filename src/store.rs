use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::result::TestResult;
use crate::stats::TypingStats;
use crate::util::round_half_up;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StoreErrorKind {
    PermissionDenied,
    Unavailable,
    SchemaMissing,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("schema missing: {0}")]
    SchemaMissing(String),
    #[error("store error: {0}")]
    Unknown(String),
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            StoreErrorKind::PermissionDenied => Self::PermissionDenied(message),
            StoreErrorKind::Unavailable => Self::Unavailable(message),
            StoreErrorKind::SchemaMissing => Self::SchemaMissing(message),
            StoreErrorKind::Unknown => Self::Unknown(message),
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::PermissionDenied(_) => StoreErrorKind::PermissionDenied,
            Self::Unavailable(_) => StoreErrorKind::Unavailable,
            Self::SchemaMissing(_) => StoreErrorKind::SchemaMissing,
            Self::Unknown(_) => StoreErrorKind::Unknown,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        let message = e.to_string();
        let kind = match &e {
            rusqlite::Error::SqliteFailure(err, msg) => match err.code {
                ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::AuthorizationForStatementDenied => StoreErrorKind::PermissionDenied,
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt => StoreErrorKind::Unavailable,
                _ if msg.as_deref().is_some_and(|m| m.contains("no such table")) => {
                    StoreErrorKind::SchemaMissing
                }
                _ => StoreErrorKind::Unknown,
            },
            _ => StoreErrorKind::Unknown,
        };
        Self::new(kind, message)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(e.to_string()),
            _ => Self::Unavailable(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Unknown(e.to_string())
    }
}

/// Per-user running aggregates, updated in O(1) per saved result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_tests: u32,
    #[serde(rename = "bestWPM")]
    pub best_wpm: u32,
    #[serde(rename = "averageWPM")]
    pub average_wpm: u32,
    pub average_accuracy: u32,
    pub total_time: f64,
    pub last_test_date: Option<DateTime<Local>>,
}

impl AggregateStats {
    /// Folds one more result into the aggregates without revisiting history.
    pub fn record(&self, result: &TestResult) -> Self {
        let old_count = self.total_tests as f64;
        let running_average = |old: u32, new: u32| -> u32 {
            round_half_up((old as f64 * old_count + new as f64) / (old_count + 1.0)) as u32
        };

        Self {
            total_tests: self.total_tests + 1,
            best_wpm: self.best_wpm.max(result.stats.wpm),
            average_wpm: running_average(self.average_wpm, result.stats.wpm),
            average_accuracy: running_average(self.average_accuracy, result.stats.accuracy),
            total_time: self.total_time + result.stats.total_time,
            last_test_date: Some(result.timestamp),
        }
    }
}

/// Durable storage for completed results.
pub trait ResultStore {
    /// Stores the result and folds it into the user's aggregates. Returns the record id.
    fn save_result(&mut self, user_id: &str, result: &TestResult) -> Result<String, StoreError>;
    fn aggregate_stats(&self, user_id: &str) -> Result<AggregateStats, StoreError>;
    /// Most recent first.
    fn recent_results(&self, user_id: &str, limit: usize) -> Result<Vec<TestResult>, StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS test_results (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    wpm INTEGER NOT NULL,
    accuracy INTEGER NOT NULL,
    correct INTEGER NOT NULL,
    incorrect INTEGER NOT NULL,
    missed INTEGER NOT NULL,
    total_time REAL NOT NULL,
    char_count INTEGER NOT NULL,
    settings TEXT NOT NULL,
    wpm_history TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_test_results_user_created
    ON test_results(user_id, created_at);
CREATE TABLE IF NOT EXISTS user_stats (
    user_id TEXT PRIMARY KEY,
    total_tests INTEGER NOT NULL,
    best_wpm INTEGER NOT NULL,
    average_wpm INTEGER NOT NULL,
    average_accuracy INTEGER NOT NULL,
    total_time REAL NOT NULL,
    last_test_date TEXT
);
"#;

/// SQLite-backed result store.
#[derive(Debug)]
pub struct SqliteResultStore {
    conn: Connection,
}

impl SqliteResultStore {
    /// Opens (creating if needed) the database file and its tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_schema(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn read_aggregate(conn: &Connection, user_id: &str) -> Result<AggregateStats, StoreError> {
        let row = conn
            .query_row(
                r#"
                SELECT total_tests, best_wpm, average_wpm, average_accuracy, total_time, last_test_date
                FROM user_stats
                WHERE user_id = ?1
                "#,
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((total_tests, best_wpm, average_wpm, average_accuracy, total_time, last)) = row
        else {
            return Ok(AggregateStats::default());
        };

        Ok(AggregateStats {
            total_tests: total_tests as u32,
            best_wpm: best_wpm as u32,
            average_wpm: average_wpm as u32,
            average_accuracy: average_accuracy as u32,
            total_time,
            last_test_date: last.as_deref().and_then(parse_timestamp),
        })
    }
}

/// Fixed-width UTC text, so lexical order in SQL is time order.
fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Local))
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<(TestResult, String, String)> {
    let created_at: String = row.get(11)?;
    let timestamp = parse_timestamp(&created_at).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(11, "created_at".to_string(), rusqlite::types::Type::Text)
    })?;

    let stats = TypingStats {
        wpm: row.get::<_, i64>(1)? as u32,
        accuracy: row.get::<_, i64>(2)? as u32,
        correct: row.get::<_, i64>(3)? as usize,
        incorrect: row.get::<_, i64>(4)? as usize,
        missed: row.get::<_, i64>(5)? as usize,
        total_time: row.get(6)?,
        char_count: row.get::<_, i64>(7)? as usize,
    };

    let result = TestResult {
        id: row.get(0)?,
        timestamp,
        settings: Default::default(),
        wpm_history: Vec::new(),
        stats,
    };
    // json columns are decoded by the caller so serde errors keep their own kind
    Ok((result, row.get(8)?, row.get(9)?))
}

impl ResultStore for SqliteResultStore {
    fn save_result(&mut self, user_id: &str, result: &TestResult) -> Result<String, StoreError> {
        let settings = serde_json::to_string(&result.settings)?;
        let history = serde_json::to_string(&result.wpm_history)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO test_results
            (id, user_id, wpm, accuracy, correct, incorrect, missed, total_time, char_count,
             settings, wpm_history, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                result.id,
                user_id,
                result.stats.wpm as i64,
                result.stats.accuracy as i64,
                result.stats.correct as i64,
                result.stats.incorrect as i64,
                result.stats.missed as i64,
                result.stats.total_time,
                result.stats.char_count as i64,
                settings,
                history,
                format_timestamp(&result.timestamp),
            ],
        )?;
        let record_id = tx.last_insert_rowid();

        let updated = Self::read_aggregate(&tx, user_id)?.record(result);
        tx.execute(
            r#"
            INSERT OR REPLACE INTO user_stats
            (user_id, total_tests, best_wpm, average_wpm, average_accuracy, total_time, last_test_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user_id,
                updated.total_tests as i64,
                updated.best_wpm as i64,
                updated.average_wpm as i64,
                updated.average_accuracy as i64,
                updated.total_time,
                updated.last_test_date.map(|d| format_timestamp(&d)),
            ],
        )?;
        tx.commit()?;

        Ok(record_id.to_string())
    }

    fn aggregate_stats(&self, user_id: &str) -> Result<AggregateStats, StoreError> {
        Self::read_aggregate(&self.conn, user_id)
    }

    fn recent_results(&self, user_id: &str, limit: usize) -> Result<Vec<TestResult>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, wpm, accuracy, correct, incorrect, missed, total_time, char_count,
                   settings, wpm_history, row_id, created_at
            FROM test_results
            WHERE user_id = ?1
            ORDER BY created_at DESC, row_id DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![user_id, limit as i64], result_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            let (mut result, settings, history) = row?;
            result.settings = serde_json::from_str(&settings)?;
            result.wpm_history = serde_json::from_str(&history)?;
            results.push(result);
        }
        Ok(results)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    results: Vec<(String, TestResult)>,
    aggregates: HashMap<String, AggregateStats>,
    failure: Option<StoreErrorKind>,
    save_calls: usize,
}

/// In-process store. Clones share state, so a handle can be kept while a
/// worker thread owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))
    }

    /// Makes every following call fail with `kind` until cleared with `None`.
    pub fn set_failure(&self, kind: Option<StoreErrorKind>) {
        if let Ok(mut inner) = self.lock() {
            inner.failure = kind;
        }
    }

    /// Number of `save_result` calls seen, failed ones included.
    pub fn save_calls(&self) -> usize {
        self.lock().map(|inner| inner.save_calls).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.results.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultStore for MemoryResultStore {
    fn save_result(&mut self, user_id: &str, result: &TestResult) -> Result<String, StoreError> {
        let mut inner = self.lock()?;
        inner.save_calls += 1;
        if let Some(kind) = inner.failure {
            return Err(StoreError::new(kind, "injected failure"));
        }

        let updated = inner
            .aggregates
            .get(user_id)
            .cloned()
            .unwrap_or_default()
            .record(result);
        inner.aggregates.insert(user_id.to_string(), updated);
        inner.results.push((user_id.to_string(), result.clone()));
        Ok(inner.results.len().to_string())
    }

    fn aggregate_stats(&self, user_id: &str) -> Result<AggregateStats, StoreError> {
        let inner = self.lock()?;
        if let Some(kind) = inner.failure {
            return Err(StoreError::new(kind, "injected failure"));
        }
        Ok(inner.aggregates.get(user_id).cloned().unwrap_or_default())
    }

    fn recent_results(&self, user_id: &str, limit: usize) -> Result<Vec<TestResult>, StoreError> {
        let inner = self.lock()?;
        if let Some(kind) = inner.failure {
            return Err(StoreError::new(kind, "injected failure"));
        }
        Ok(inner
            .results
            .iter()
            .rev()
            .filter(|(uid, _)| uid == user_id)
            .take(limit)
            .map(|(_, result)| result.clone())
            .collect())
    }
}
