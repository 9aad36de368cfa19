pub mod bedrock;
pub mod config;
pub mod error;
pub mod handler;
pub mod imaging;
pub mod logger;
pub mod metrics;
pub mod models;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;

pub use bedrock::{BedrockClient, EditTask, ImageClient, ImageEditBackend, TaskParams};
pub use config::{BedrockConfig, Config, GenerationConfig, PostgresConfig, SinkKind, UpstashConfig};
pub use error::{BackendError, BackendErrorKind, ConfigError, EditError, SinkError, ValidationCode};
pub use handler::EditHandler;
pub use models::{EditMode, EditRequest, EditResponse, UsageRecord, UsageStatus};
pub use storage::{UsageSink, UsageSinkManager};
