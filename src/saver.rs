//! Hands finished results to a [`ResultStore`] without blocking the session.
//!
//! [`ResultSaver`] holds the one-shot guard: a result id that was saved (or is
//! being saved) is never written twice. A failed save releases the guard so an
//! explicit retry can go through. [`spawn`] moves a saver onto a worker thread
//! and splits it into a [`SaveQueue`] (the session's sink) and a
//! [`SaveMonitor`] (status and retry for the front end).
//!
//! Every submission announces itself on the outcome channel before the job
//! reaches the worker, so the monitor always sees `Queued` ahead of the
//! matching `Saved` or `Failed`, however quickly the worker runs.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::result::{ResultSink, TestResult};
use crate::store::{ResultStore, StoreError, StoreErrorKind};

pub struct ResultSaver {
    store: Box<dyn ResultStore + Send>,
    user_id: String,
    claimed: Option<String>,
}

impl ResultSaver {
    pub fn new(store: Box<dyn ResultStore + Send>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            claimed: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// `Ok(None)` when this result was already saved.
    pub fn save(&mut self, result: &TestResult) -> Result<Option<String>, StoreError> {
        if self.claimed.as_deref() == Some(result.id.as_str()) {
            debug!(result_id = %result.id, "result already saved, skipping");
            return Ok(None);
        }
        self.claimed = Some(result.id.clone());

        match self.store.save_result(&self.user_id, result) {
            Ok(record_id) => {
                info!(result_id = %result.id, record_id = %record_id, wpm = result.stats.wpm, "saved test result");
                Ok(Some(record_id))
            }
            Err(e) => {
                error!(result_id = %result.id, kind = %e.kind(), error = %e, "failed to save test result");
                self.claimed = None;
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveStatus {
    /// Nothing submitted yet for the current test.
    Idle,
    Saving,
    Saved { result_id: String, record_id: String },
    Failed { result_id: String, error: StoreError },
}

impl SaveStatus {
    pub fn failure_kind(&self) -> Option<StoreErrorKind> {
        match self {
            SaveStatus::Failed { error, .. } => Some(error.kind()),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Outcome {
    Queued {
        result_id: String,
    },
    Saved {
        result_id: String,
        record_id: String,
    },
    Duplicate {
        result_id: String,
    },
    Failed {
        result: Box<TestResult>,
        error: StoreError,
    },
}

/// Sink side: enqueues results for the worker.
#[derive(Debug, Clone)]
pub struct SaveQueue {
    tx: Sender<TestResult>,
    outcomes: Sender<Outcome>,
}

impl ResultSink for SaveQueue {
    fn submit(&mut self, result: &TestResult) {
        let _ = self.outcomes.send(Outcome::Queued {
            result_id: result.id.clone(),
        });
        if self.tx.send(result.clone()).is_err() {
            error!(result_id = %result.id, "save worker is gone, result not persisted");
        }
    }
}

/// Front-end side: observes outcomes and retries failures on request.
#[derive(Debug)]
pub struct SaveMonitor {
    tx: Sender<TestResult>,
    rx: Receiver<Outcome>,
    status: SaveStatus,
    // id of the result the status describes
    current: Option<String>,
    failed: Option<TestResult>,
}

impl SaveMonitor {
    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    /// Forgets the previous test's outcome. Outcomes that arrive later for
    /// that test are logged and dropped.
    pub fn clear(&mut self) {
        self.status = SaveStatus::Idle;
        self.current = None;
        self.failed = None;
    }

    /// Drains finished outcomes without blocking.
    pub fn poll(&mut self) -> &SaveStatus {
        while let Ok(outcome) = self.rx.try_recv() {
            self.apply(outcome);
        }
        &self.status
    }

    /// Blocks up to `timeout` until the save in flight, if any, settles.
    pub fn wait(&mut self, timeout: Duration) -> &SaveStatus {
        let deadline = Instant::now() + timeout;
        self.poll();
        while self.status == SaveStatus::Saving {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(outcome) => self.apply(outcome),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("save worker disconnected");
                    break;
                }
            }
        }
        &self.status
    }

    /// Resubmits the last failed result. Returns false if there is nothing to retry.
    pub fn retry(&mut self) -> bool {
        let Some(result) = self.failed.take() else {
            return false;
        };
        info!(result_id = %result.id, "retrying save");
        if self.tx.send(result).is_err() {
            error!("save worker is gone, cannot retry");
            return false;
        }
        self.status = SaveStatus::Saving;
        true
    }

    fn is_current(&self, result_id: &str) -> bool {
        self.current.as_deref() == Some(result_id)
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Queued { result_id } => {
                if !self.is_current(&result_id) {
                    self.current = Some(result_id);
                    self.status = SaveStatus::Saving;
                    self.failed = None;
                }
            }
            Outcome::Saved {
                result_id,
                record_id,
            } if self.is_current(&result_id) => {
                self.failed = None;
                self.status = SaveStatus::Saved {
                    result_id,
                    record_id,
                };
            }
            Outcome::Failed { result, error } if self.is_current(&result.id) => {
                self.status = SaveStatus::Failed {
                    result_id: result.id.clone(),
                    error,
                };
                self.failed = Some(*result);
            }
            Outcome::Duplicate { result_id } => {
                debug!(result_id = %result_id, "duplicate submission ignored");
            }
            stale => {
                warn!(outcome = ?stale, "save outcome for an earlier test dropped");
            }
        }
    }
}

/// Moves `saver` onto a worker thread. The thread exits once every sender is dropped.
pub fn spawn(mut saver: ResultSaver) -> (SaveQueue, SaveMonitor) {
    let (job_tx, job_rx) = mpsc::channel::<TestResult>();
    let (out_tx, out_rx) = mpsc::channel();

    let worker_tx = out_tx.clone();
    thread::spawn(move || {
        for result in job_rx {
            let outcome = match saver.save(&result) {
                Ok(Some(record_id)) => Outcome::Saved {
                    result_id: result.id,
                    record_id,
                },
                Ok(None) => Outcome::Duplicate {
                    result_id: result.id,
                },
                Err(error) => Outcome::Failed {
                    result: Box::new(result),
                    error,
                },
            };
            if worker_tx.send(outcome).is_err() {
                break;
            }
        }
    });

    (
        SaveQueue {
            tx: job_tx.clone(),
            outcomes: out_tx,
        },
        SaveMonitor {
            tx: job_tx,
            rx: out_rx,
            status: SaveStatus::Idle,
            current: None,
            failed: None,
        },
    )
}
