//! Audit trail
//!
//! Appends one JSON line per pipeline state transition, tagged with the id of
//! the run that made it. One log is shared by every run of a pipeline. Entries
//! carry hashes, addresses and amounts only; signing material never reaches
//! this module. A failed write is logged and otherwise ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    run_id: Uuid,
    state: &'a str,
    detail: &'a Value,
}

/// Shared JSONL writer
pub struct AuditLog {
    path: PathBuf,
    // Serializes appends so lines from concurrent tasks never interleave
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, run_id: Uuid, state: &str, detail: Value) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            run_id,
            state,
            detail: &detail,
        };

        let _guard = self.lock.lock().await;
        if let Err(e) = self.append(&entry) {
            tracing::warn!(
                path = %self.path.display(),
                %run_id,
                state,
                error = %e,
                "Failed to write audit log entry"
            );
        }
    }

    fn append(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}
