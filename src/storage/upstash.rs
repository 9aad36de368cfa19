use crate::{
    config::UpstashConfig,
    error::{ConfigError, SinkError},
    models::UsageRecord,
    storage::traits::UsageSink,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Stores each record under `<prefix>:<id>` through the Upstash Redis REST
/// API. `SET ... NX` keeps records write-once.
pub struct UpstashUsageSink {
    client: Client,
    base_url: String,
    token: String,
    key_prefix: String,
}

impl UpstashUsageSink {
    pub fn new(config: UpstashConfig) -> Result<Self, ConfigError> {
        let base_url = config.url.ok_or(ConfigError::Missing("UPSTASH_URL"))?;
        let token = config.token.ok_or(ConfigError::Missing("UPSTASH_TOKEN"))?;

        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            key_prefix: config.key_prefix,
        })
    }

    pub fn key_for(&self, id: &str) -> String {
        format!("{}:{}", self.key_prefix, id)
    }

    async fn command(&self, command: Value) -> Result<Value, SinkError> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(format!("Upstash request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SinkError::Unavailable(format!(
                "Upstash returned {}: {}",
                status, error_text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SinkError::Unavailable(format!("Invalid Upstash response: {}", e)))?;

        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(SinkError::Rejected(error.to_string()));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl UsageSink for UpstashUsageSink {
    async fn append(&self, record: &UsageRecord) -> Result<(), SinkError> {
        let value = serde_json::to_string(record)?;
        let result = self
            .command(json!(["SET", self.key_for(&record.id), value, "NX"]))
            .await?;

        if result.is_null() {
            return Err(SinkError::Rejected(format!(
                "record {} already exists",
                record.id
            )));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SinkError> {
        let result = self.command(json!(["PING"])).await?;
        Ok(result.as_str() == Some("PONG"))
    }

    fn name(&self) -> &'static str {
        "upstash"
    }
}
