// src/store/processed.rs
//! Append-only record of candidates that reached a terminal state.
//!
//! `processed_ids.txt` holds one id per line and never shrinks; it is loaded
//! fully at startup. `reasons.jsonl` is the audit trail, one JSON object per
//! terminal transition.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{append_line, StoreError};
use crate::candidate::{Candidate, CandidateStatus, StageName};

pub const PROCESSED_FILE: &str = "processed_ids.txt";
pub const REASONS_FILE: &str = "reasons.jsonl";

/// One line of the reason log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalRecord {
    pub id: String,
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl TerminalRecord {
    pub fn from_candidate(c: &Candidate, at: DateTime<Utc>) -> Self {
        let (stage, reason) = match &c.status {
            CandidateStatus::Rejected { reason } => (None, Some(reason.clone())),
            CandidateStatus::Failed { stage, reason } => (Some(*stage), Some(reason.clone())),
            _ => (None, None),
        };
        Self {
            id: c.id.clone(),
            outcome: c.status.label().to_string(),
            stage,
            reason,
            at,
        }
    }
}

pub struct StateStore {
    processed_path: PathBuf,
    reasons_path: PathBuf,
    processed: RwLock<HashSet<String>>,
    writer: tokio::sync::Mutex<()>,
    write_attempts: u32,
    write_backoff: Duration,
}

impl StateStore {
    /// Load the processed-id set from `state_dir` (missing file = empty set).
    pub async fn open(state_dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(state_dir)
            .await
            .map_err(|source| StoreError::Read {
                path: state_dir.to_path_buf(),
                source,
            })?;
        let processed_path = state_dir.join(PROCESSED_FILE);
        let ids = match tokio::fs::read_to_string(&processed_path).await {
            Ok(s) => s
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(source) => {
                return Err(StoreError::Read {
                    path: processed_path,
                    source,
                })
            }
        };
        debug!(target: "pipeline", processed = ids.len(), "state store loaded");
        Ok(Self {
            processed_path,
            reasons_path: state_dir.join(REASONS_FILE),
            processed: RwLock::new(ids),
            writer: tokio::sync::Mutex::new(()),
            write_attempts: 3,
            write_backoff: Duration::from_millis(50),
        })
    }

    /// Override the internal write retry (attempts are clamped to >= 1).
    pub fn with_write_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.write_attempts = attempts.max(1);
        self.write_backoff = backoff;
        self
    }

    pub fn exists(&self, id: &str) -> bool {
        self.processed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.processed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durably mark `record.id` terminal. Idempotent: returns `Ok(false)` when the
    /// id was already recorded. The id becomes visible to [`exists`](Self::exists)
    /// only after the write succeeded; an unrecoverable write error is returned
    /// and must abort the run.
    pub async fn record_terminal(&self, record: &TerminalRecord) -> Result<bool, StoreError> {
        let _guard = self.writer.lock().await;
        if self.exists(&record.id) {
            return Ok(false);
        }

        // Audit line first: a crash in between replays into a duplicate audit
        // line, never into a terminal id without one.
        self.append_reason(record).await?;
        self.append_with_retry(&self.processed_path, &record.id).await?;

        self.processed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone());
        debug!(target: "pipeline", id = %record.id, outcome = %record.outcome, "terminal state recorded");
        Ok(true)
    }

    /// Audit line only; the id is not marked terminal. Used for rejections of
    /// a candidate whose id is owned by another (processed or in-flight) one.
    pub async fn log_reason(&self, record: &TerminalRecord) -> Result<(), StoreError> {
        let _guard = self.writer.lock().await;
        self.append_reason(record).await
    }

    async fn append_reason(&self, record: &TerminalRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            path: self.reasons_path.clone(),
            message: e.to_string(),
        })?;
        self.append_with_retry(&self.reasons_path, &line).await
    }

    /// Read back the reason log (audit / summaries).
    pub async fn read_reasons(&self) -> Result<Vec<TerminalRecord>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.reasons_path).await {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.reasons_path.clone(),
                    source,
                })
            }
        };
        raw.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str(l).map_err(|e| StoreError::Corrupt {
                    path: self.reasons_path.clone(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    async fn append_with_retry(&self, path: &Path, line: &str) -> Result<(), StoreError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match append_line(path, line).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.write_attempts => {
                    warn!(target: "pipeline", path = %path.display(), attempt, error = %e, "state write failed; retrying");
                    tokio::time::sleep(self.write_backoff * attempt).await;
                }
                Err(source) => {
                    return Err(StoreError::Write {
                        path: path.to_path_buf(),
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }
}
