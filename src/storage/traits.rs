use crate::{error::SinkError, models::UsageRecord};
use async_trait::async_trait;

/// Append-only destination for usage records. There is no read path.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn append(&self, record: &UsageRecord) -> Result<(), SinkError>;

    async fn health_check(&self) -> Result<bool, SinkError>;

    fn name(&self) -> &'static str;
}
