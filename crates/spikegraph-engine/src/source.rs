//! Inbound event sources.
//!
//! The reasoning system writes one JSON message per line to the engine's
//! stdin. [`forward_lines`] pushes each non-blank line, in order, into the
//! session's inbound queue. [`load_static_links`] reads the optional file
//! of static link descriptors applied before live ingestion starts.

use std::path::Path;

use spikegraph_types::StaticLink;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::EngineError;

/// Forward every non-blank line of `reader` into `tx`, in order.
///
/// Stops at end of input, on a read error, or when the receiver is gone.
/// Returns the number of lines forwarded.
pub async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>) -> u64
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded: u64 = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(line).await.is_err() {
                    info!("Inbound queue closed, no longer reading input");
                    break;
                }
                forwarded = forwarded.saturating_add(1);
            }
            Ok(None) => {
                info!(forwarded, "Input reached end of stream");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read input line");
                break;
            }
        }
    }
    forwarded
}

/// Spawn a task that forwards stdin lines into the inbound queue.
///
/// Dropping `tx` when stdin ends closes the queue, which the runner
/// treats as the end of the live stream.
pub fn spawn_stdin_source(tx: mpsc::Sender<String>) -> JoinHandle<u64> {
    tokio::spawn(async move { forward_lines(BufReader::new(tokio::io::stdin()), tx).await })
}

/// Parse a JSON array of static link descriptors.
///
/// Entries that are not valid descriptors (including unknown relation
/// types) are logged and skipped.
///
/// # Errors
///
/// Returns [`EngineError::StaticLinksFormat`] if the text is not a JSON
/// array.
pub fn parse_static_links(text: &str) -> Result<Vec<StaticLink>, EngineError> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let total = raw.len();
    let links: Vec<StaticLink> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(position, value)| match serde_json::from_value(value) {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(position, error = %e, "Skipping invalid static link descriptor");
                None
            }
        })
        .collect();
    info!(loaded = links.len(), total, "Static link descriptors parsed");
    Ok(links)
}

/// Read and parse the static link file at `path`.
///
/// # Errors
///
/// Returns [`EngineError::StaticLinksIo`] if the file cannot be read, or
/// [`EngineError::StaticLinksFormat`] if it is not a JSON array.
pub async fn load_static_links(path: &Path) -> Result<Vec<StaticLink>, EngineError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| EngineError::StaticLinksIo {
            path: path.to_path_buf(),
            source,
        })?;
    parse_static_links(&text)
}
