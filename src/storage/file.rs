use crate::{error::SinkError, models::UsageRecord, storage::traits::UsageSink};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Appends one JSON document per line.
pub struct JsonlUsageSink {
    path: PathBuf,
}

impl JsonlUsageSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UsageSink for JsonlUsageSink {
    async fn append(&self, record: &UsageRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        // Single write per record so concurrent appends do not interleave.
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SinkError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(tokio::fs::metadata(parent)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
