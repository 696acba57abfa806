//! JSON-lines file sink
//!
//! Appends each record as one JSON line to
//! `<root>/<site_id>/<YYYY-MM-DD>.jsonl` (date of `fetched_at`, UTC).

use async_trait::async_trait;
use harvest_core::domain::record::CrawlRecord;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::sink::StorageSink;

pub struct JsonlFileSink {
    root: PathBuf,
    // Whole-line appends from concurrent jobs must not interleave.
    write_lock: Mutex<()>,
}

impl JsonlFileSink {
    /// Creates a sink rooted at `root`
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a record is appended to
    pub fn path_for(&self, record: &CrawlRecord) -> PathBuf {
        self.root
            .join(sanitize(&record.site_id))
            .join(format!("{}.jsonl", record.fetched_at.format("%Y-%m-%d")))
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            sink: self.name().to_string(),
            source,
        }
    }
}

/// Keeps site ids from escaping the sink root
fn sanitize(site_id: &str) -> String {
    site_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl StorageSink for JsonlFileSink {
    fn name(&self) -> &str {
        "jsonl-file"
    }

    async fn write(&self, record: &CrawlRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record).map_err(|source| SinkError::Serialize {
            sink: self.name().to_string(),
            source,
        })?;
        line.push('\n');

        let path = self.path_for(record);

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| self.io_error(e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        Ok(())
    }
}
