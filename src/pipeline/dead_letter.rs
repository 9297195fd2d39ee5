//! Append-only JSON-lines log of events that could not be applied.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::EventEnvelope;

/// One dead-lettered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// Unique entry id.
    pub id: Uuid,
    /// The event exactly as received.
    pub envelope: EventEnvelope,
    /// Failure message.
    pub error: String,
    /// Failure label (`transient_io`, `out_of_order`, ...).
    pub error_kind: String,
    /// Attempts made before giving up.
    pub attempts: u32,
    /// When the entry was written.
    pub recorded_at: DateTime<Utc>,
}

/// Writer for `dead_letter.jsonl`.
#[derive(Debug)]
pub struct DeadLetterLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DeadLetterLog {
    /// File name used inside the data directory.
    pub const FILE_NAME: &'static str = "dead_letter.jsonl";

    /// Log at `{dir}/dead_letter.jsonl`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::at(dir.join(Self::FILE_NAME))
    }

    /// Log at an explicit path.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be opened or written.
    pub async fn record(
        &self,
        envelope: &EventEnvelope,
        error_kind: &str,
        error: &str,
        attempts: u32,
    ) -> Result<DeadLetter, std::io::Error> {
        let entry = DeadLetter {
            id: Uuid::new_v4(),
            envelope: envelope.clone(),
            error: error.to_string(),
            error_kind: error_kind.to_string(),
            attempts,
            recorded_at: Utc::now(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(entry)
    }

    /// Reads every entry back; unreadable lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file exists but cannot be read.
    pub async fn entries(&self) -> Result<Vec<DeadLetter>, std::io::Error> {
        let body = match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(body
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
