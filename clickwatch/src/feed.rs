// clickwatch/src/feed.rs
//
// JSONL feed tailer. The host appends one FeedRecord per line; a line without
// its trailing newline is still being written and stays buffered until the
// rest arrives.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::events::FeedRecord;

const POLL: Duration = Duration::from_millis(50);

/// Follow `path` forever, sending every parsed record to `tx`. With
/// `seek_end`, complete lines already in the file are skipped. Returns when
/// the receiver is dropped.
pub async fn tail_jsonl(path: impl AsRef<Path>, tx: mpsc::Sender<FeedRecord>, seek_end: bool) -> Result<()> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening feed {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = Vec::new();

    if seek_end {
        while reader.read_until(b'\n', &mut buf).await? > 0 {
            if buf.ends_with(b"\n") {
                buf.clear();
            }
        }
    }

    info!("Tailing {}", path.display());
    loop {
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 || !buf.ends_with(b"\n") {
            tokio::time::sleep(POLL).await;
            continue;
        }

        if !buf.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice::<FeedRecord>(&buf) {
                Ok(rec) => {
                    if tx.send(rec).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "feed parse error"),
            }
        }
        buf.clear();
    }
    Ok(())
}
