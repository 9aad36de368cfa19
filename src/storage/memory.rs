use crate::{error::SinkError, models::UsageRecord, storage::traits::UsageSink};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryLog {
    ids: HashSet<String>,
    records: Vec<UsageRecord>,
}

/// Keeps records in process memory. Nothing survives a restart; meant for
/// local runs and tests.
#[derive(Default)]
pub struct MemoryUsageSink {
    log: RwLock<MemoryLog>,
}

impl MemoryUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<UsageRecord> {
        self.log.read().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.records.len()
    }
}

#[async_trait]
impl UsageSink for MemoryUsageSink {
    async fn append(&self, record: &UsageRecord) -> Result<(), SinkError> {
        let mut log = self.log.write().await;
        if !log.ids.insert(record.id.clone()) {
            return Err(SinkError::Rejected(format!(
                "record {} already exists",
                record.id
            )));
        }
        log.records.push(record.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SinkError> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
