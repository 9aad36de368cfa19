use crate::{
    config::PostgresConfig,
    error::{ConfigError, SinkError},
    models::UsageRecord,
    storage::traits::UsageSink,
};

use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

pub struct PostgresUsageSink {
    pool: Pool,
    insert_sql: String,
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn is_valid_table_name(table: &str) -> bool {
    let mut chars = table.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && table.len() <= 63
}

impl PostgresUsageSink {
    pub async fn new(config: PostgresConfig) -> Result<Self, ConfigError> {
        if !is_valid_table_name(&config.table) {
            return Err(ConfigError::Invalid(format!(
                "invalid usage table name '{}'",
                config.table
            )));
        }

        let mut cfg = Config::new();
        cfg.host = config.host;
        cfg.port = config.port;
        cfg.user = config.username;
        cfg.password = config.password;
        cfg.dbname = config.database;

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create pool: {}", e)))?;

        let insert_sql = format!(
            "INSERT INTO {} (id, created_at, model_used, mode, prompt_text, input_width,
                input_height, input_image_bytes, mask_image_bytes, output_image_bytes,
                generation_time_ms, status, error_code, error_message)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            config.table
        );

        let sink = Self { pool, insert_sql };
        sink.initialize_schema(&config.table)
            .await
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(sink)
    }

    async fn initialize_schema(&self, table: &str) -> Result<(), SinkError> {
        let client = self.pool.get().await.map_err(|e| {
            SinkError::Unavailable(format!("Failed to get connection: {}", e))
        })?;

        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    created_at TIMESTAMPTZ NOT NULL,
                    model_used TEXT NOT NULL,
                    mode TEXT NOT NULL,
                    prompt_text TEXT NOT NULL,
                    input_width BIGINT NOT NULL,
                    input_height BIGINT NOT NULL,
                    input_image_bytes BIGINT NOT NULL,
                    mask_image_bytes BIGINT,
                    output_image_bytes BIGINT[] NOT NULL,
                    generation_time_ms BIGINT NOT NULL,
                    status TEXT NOT NULL,
                    error_code TEXT,
                    error_message TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table}(created_at);"
            ))
            .await
            .map_err(|e| SinkError::Unavailable(format!("Failed to create usage table: {}", e)))?;

        log::info!("PostgreSQL usage table '{}' ready", table);
        Ok(())
    }
}

#[async_trait]
impl UsageSink for PostgresUsageSink {
    async fn append(&self, record: &UsageRecord) -> Result<(), SinkError> {
        let client = self.pool.get().await.map_err(|e| {
            SinkError::Unavailable(format!("Failed to get connection: {}", e))
        })?;

        let output_sizes: Vec<i64> = record
            .output_image_bytes
            .iter()
            .map(|size| *size as i64)
            .collect();

        client
            .execute(
                self.insert_sql.as_str(),
                &[
                    &record.id,
                    &record.timestamp,
                    &record.model_used,
                    &record.mode.as_str(),
                    &record.prompt_text,
                    &(record.input_width as i64),
                    &(record.input_height as i64),
                    &(record.input_image_bytes as i64),
                    &record.mask_image_bytes.map(|size| size as i64),
                    &output_sizes,
                    &(record.generation_time_ms as i64),
                    &record.status.as_str(),
                    &record.error_code,
                    &record.error_message,
                ],
            )
            .await
            .map_err(|e| SinkError::Rejected(format!("Failed to insert usage record: {}", e)))?;

        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SinkError> {
        let client = self.pool.get().await.map_err(|e| {
            SinkError::Unavailable(format!("Failed to get connection: {}", e))
        })?;
        client
            .simple_query("SELECT 1")
            .await
            .map(|_| true)
            .map_err(|e| SinkError::Unavailable(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
