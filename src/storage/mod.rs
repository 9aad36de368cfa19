pub mod file;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;
#[cfg(feature = "upstash")]
pub mod upstash;

use crate::config::{Config, SinkKind};
use crate::error::ConfigError;
use std::sync::Arc;

pub use file::JsonlUsageSink;
pub use memory::MemoryUsageSink;
pub use traits::UsageSink;

#[cfg(feature = "postgres")]
pub use postgres::PostgresUsageSink;

#[cfg(feature = "upstash")]
pub use upstash::UpstashUsageSink;

/// Builds the usage sink selected by `Config::sink`.
pub struct UsageSinkManager {
    backend: Arc<dyn UsageSink>,
}

impl UsageSinkManager {
    pub async fn new(config: &Config) -> Result<Self, ConfigError> {
        let backend: Arc<dyn UsageSink> = match config.sink {
            SinkKind::Memory => {
                log::warn!("Usage records are kept in memory and are lost on restart");
                Arc::new(MemoryUsageSink::new())
            }
            SinkKind::File => Arc::new(JsonlUsageSink::new(&config.usage_log_path)),
            SinkKind::Upstash => {
                #[cfg(feature = "upstash")]
                {
                    let upstash_config = config
                        .upstash
                        .clone()
                        .ok_or(ConfigError::Missing("Upstash config"))?;
                    Arc::new(UpstashUsageSink::new(upstash_config)?)
                }
                #[cfg(not(feature = "upstash"))]
                {
                    return Err(ConfigError::Invalid("Upstash feature not enabled".into()));
                }
            }
            SinkKind::Postgres => {
                #[cfg(feature = "postgres")]
                {
                    let postgres_config = config
                        .postgres
                        .clone()
                        .ok_or(ConfigError::Missing("PostgreSQL config"))?;
                    Arc::new(PostgresUsageSink::new(postgres_config).await?)
                }
                #[cfg(not(feature = "postgres"))]
                {
                    return Err(ConfigError::Invalid("PostgreSQL feature not enabled".into()));
                }
            }
        };

        Ok(Self { backend })
    }

    pub fn sink(&self) -> Arc<dyn UsageSink> {
        Arc::clone(&self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn selects_sink_from_config() {
        let manager = UsageSinkManager::new(&Config::new()).await.unwrap();
        assert_eq!(manager.sink().name(), "file");

        let mut config = Config::new();
        config.sink = SinkKind::Memory;
        let manager = UsageSinkManager::new(&config).await.unwrap();
        assert_eq!(manager.sink().name(), "memory");
    }

    #[tokio::test]
    async fn upstash_without_credentials_is_a_config_error() {
        let mut config = Config::new();
        config.sink = SinkKind::Upstash;
        assert!(UsageSinkManager::new(&config).await.is_err());
    }
}
