//! JSON-lines replay of exported ledger events.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::domain::EventEnvelope;

/// Summary of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Envelopes handed to the projector.
    pub delivered: usize,
    /// Lines that were not valid envelopes.
    pub skipped: usize,
}

/// Streams one [`EventEnvelope`] per line of `path` into `sink`.
///
/// Blank lines are ignored. Lines that are not envelopes are logged and
/// skipped. Stops early if the projector queue closes.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be opened or read.
pub async fn replay_file(
    path: &Path,
    sink: &mpsc::Sender<EventEnvelope>,
) -> Result<ReplayStats, std::io::Error> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut stats = ReplayStats::default();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventEnvelope>(&line) {
            Ok(envelope) => {
                if sink.send(envelope).await.is_err() {
                    tracing::warn!(line = line_no, "projector queue closed; replay stopped");
                    break;
                }
                stats.delivered += 1;
            }
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, raw = %line, "skipping malformed replay line");
                stats.skipped += 1;
            }
        }
    }

    tracing::info!(path = %path.display(), delivered = stats.delivered, skipped = stats.skipped, "replay finished");
    Ok(stats)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_valid_lines_and_skips_garbage() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let path = tmp.path().join("events.jsonl");
        let body = concat!(
            r#"{"kind":"PairCreated","payload":{"pairId":1,"pairKey":"p","creator":"c","basePrice":1},"slot":1}"#,
            "\n\n",
            "not json\n",
            r#"{"kind":"SwapExecuted","payload":{},"slot":2,"index":3}"#,
            "\n",
        );
        assert!(std::fs::write(&path, body).is_ok());

        let (tx, mut rx) = mpsc::channel(8);
        let Ok(stats) = replay_file(&path, &tx).await else {
            panic!("replay failed");
        };
        assert_eq!(stats, ReplayStats { delivered: 2, skipped: 1 });

        let Some(first) = rx.recv().await else {
            panic!("missing event");
        };
        assert_eq!(first.kind, "PairCreated");
        let Some(second) = rx.recv().await else {
            panic!("missing event");
        };
        assert_eq!(second.index, 3);
    }
}
