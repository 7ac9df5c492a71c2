//! JSONL transport for `digiclick-telemetry`. Appends one event per line.
//!
//! Useful for local development and for hosts that ship analytics through a log pipeline instead
//! of posting to the collector directly. Always succeeds unless the file cannot be written.

use async_trait::async_trait;
use digiclick_telemetry::{QueuedEvent, SendError, Transport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct JsonlTransport {
    path: PathBuf,
    // Serializes appends so concurrent batches never interleave lines.
    write_lock: Arc<Mutex<()>>,
}

impl JsonlTransport {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), write_lock: Arc::new(Mutex::new(())) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode_batch(batch: &[QueuedEvent]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for event in batch {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

#[async_trait]
impl Transport for JsonlTransport {
    async fn send(&self, batch: &[QueuedEvent]) -> Result<(), SendError> {
        let lines = encode_batch(batch)?;
        let _guard = self.write_lock.lock().await;
        let mut file =
            tokio::fs::OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        tracing::trace!(path = %self.path.display(), batch_size = batch.len(), "appended analytics batch");
        Ok(())
    }
}
