use crate::error::ConfigError;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL_ALIAS: &str = "titan";

#[derive(Debug, Clone)]
pub struct BedrockConfig {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        BedrockConfig {
            region: None,
            access_key: None,
            secret_key: None,
        }
    }
}

impl BedrockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let region = env::var("AWS_REGION")
            .or_else(|_| env::var("AWS_DEFAULT_REGION"))
            .ok();
        let access_key = env::var("AWS_ACCESS_KEY_ID").ok();
        let secret_key = env::var("AWS_SECRET_ACCESS_KEY").ok();

        BedrockConfig {
            region,
            access_key,
            secret_key,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }
}

/// Static generation parameters. None of these come from the request.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Request alias (e.g. `titan`) to Bedrock model id.
    pub models: HashMap<String, String>,
    pub number_of_images: u32,
    pub quality: String,
    pub width: u32,
    pub height: u32,
    pub cfg_scale: f32,
    pub max_prompt_chars: usize,
    pub min_input_dimension: u32,
    pub max_input_dimension: u32,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            DEFAULT_MODEL_ALIAS.to_string(),
            "amazon.titan-image-generator-v1".to_string(),
        );
        models.insert(
            "titan-v2".to_string(),
            "amazon.titan-image-generator-v2:0".to_string(),
        );

        GenerationConfig {
            models,
            number_of_images: 2,
            quality: "premium".to_string(),
            width: 512,
            height: 512,
            cfg_scale: 8.0,
            max_prompt_chars: 512,
            min_input_dimension: 64,
            max_input_dimension: 1408,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GenerationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(GenerationConfig {
            number_of_images: parse_var("IMAGE_COUNT")?.unwrap_or(defaults.number_of_images),
            quality: env::var("IMAGE_QUALITY").unwrap_or(defaults.quality.clone()),
            width: parse_var("OUTPUT_WIDTH")?.unwrap_or(defaults.width),
            height: parse_var("OUTPUT_HEIGHT")?.unwrap_or(defaults.height),
            cfg_scale: parse_var("CFG_SCALE")?.unwrap_or(defaults.cfg_scale),
            timeout: parse_var("GENERATION_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            ..defaults
        })
    }

    pub fn with_model(mut self, alias: impl Into<String>, model_id: impl Into<String>) -> Self {
        self.models.insert(alias.into(), model_id.into());
        self
    }

    pub fn with_image_count(mut self, count: u32) -> Self {
        self.number_of_images = count;
        self
    }

    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_input_dimension(mut self, max: u32) -> Self {
        self.max_input_dimension = max;
        self
    }

    pub fn resolve_model(&self, alias: &str) -> Option<&str> {
        self.models.get(alias).map(String::as_str)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("no image models configured".into()));
        }
        // Titan accepts 1 to 5 images per request.
        if !(1..=5).contains(&self.number_of_images) {
            return Err(ConfigError::Invalid(format!(
                "IMAGE_COUNT must be between 1 and 5, got {}",
                self.number_of_images
            )));
        }
        if self.min_input_dimension > self.max_input_dimension {
            return Err(ConfigError::Invalid(
                "minimum input dimension exceeds maximum".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("generation timeout must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub table: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        PostgresConfig {
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            table: "usage_records".to_string(),
        }
    }
}

impl PostgresConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("POSTGRES_HOST").ok();
        let port = parse_var("POSTGRES_PORT")?;
        let username = env::var("POSTGRES_USERNAME").ok();
        let password = env::var("POSTGRES_PASSWORD").ok();
        let database = env::var("POSTGRES_DATABASE").ok();
        let table = env::var("USAGE_TABLE").unwrap_or_else(|_| "usage_records".to_string());

        Ok(PostgresConfig {
            host,
            port,
            username,
            password,
            database,
            table,
        })
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_connection_info(
        mut self,
        host: impl Into<String>,
        port: u16,
        database: impl Into<String>,
    ) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self.database = Some(database.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpstashConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub key_prefix: String,
}

impl Default for UpstashConfig {
    fn default() -> Self {
        UpstashConfig {
            url: None,
            token: None,
            key_prefix: "usage".to_string(),
        }
    }
}

impl UpstashConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, url: impl Into<String>, token: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self.token = Some(token.into());
        self
    }

    pub fn from_env() -> Self {
        let url = env::var("UPSTASH_URL").ok();
        let token = env::var("UPSTASH_TOKEN").ok();
        let key_prefix = env::var("UPSTASH_KEY_PREFIX").unwrap_or_else(|_| "usage".to_string());

        UpstashConfig {
            url,
            token,
            key_prefix,
        }
    }
}

/// Which usage sink backs the append-only usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Memory,
    File,
    Upstash,
    Postgres,
}

impl SinkKind {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(SinkKind::Memory),
            "file" | "jsonl" => Ok(SinkKind::File),
            "upstash" => Ok(SinkKind::Upstash),
            "postgres" | "psql" => Ok(SinkKind::Postgres),
            other => Err(ConfigError::Invalid(format!("unknown USAGE_SINK '{}'", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Memory => "memory",
            SinkKind::File => "file",
            SinkKind::Upstash => "upstash",
            SinkKind::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub allowed_origin: String,
    pub max_request_bytes: usize,
    pub bedrock: BedrockConfig,
    pub generation: GenerationConfig,
    pub sink: SinkKind,
    pub usage_log_path: String,
    pub postgres: Option<PostgresConfig>,
    pub upstash: Option<UpstashConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origin: "*".to_string(),
            max_request_bytes: 16 * 1024 * 1024,
            bedrock: BedrockConfig::default(),
            generation: GenerationConfig::default(),
            sink: SinkKind::File,
            usage_log_path: "usage.jsonl".to_string(),
            postgres: None,
            upstash: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let sink = match env::var("USAGE_SINK") {
            Ok(value) => SinkKind::parse(&value)?,
            Err(_) => defaults.sink,
        };

        let config = Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            allowed_origin: env::var("CORS_ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            max_request_bytes: parse_var("MAX_REQUEST_BYTES")?
                .unwrap_or(defaults.max_request_bytes),
            bedrock: BedrockConfig::from_env(),
            generation: GenerationConfig::from_env()?,
            sink,
            usage_log_path: env::var("USAGE_LOG_PATH").unwrap_or(defaults.usage_log_path),
            postgres: match sink {
                SinkKind::Postgres => Some(PostgresConfig::from_env()?),
                _ => None,
            },
            upstash: (sink == SinkKind::Upstash).then(UpstashConfig::from_env),
        };
        config.generation.validate()?;
        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    pub fn with_bedrock(mut self, config: BedrockConfig) -> Self {
        self.bedrock = config;
        self
    }

    pub fn with_generation(mut self, config: GenerationConfig) -> Self {
        self.generation = config;
        self
    }

    pub fn with_usage_log(mut self, path: impl Into<String>) -> Self {
        self.usage_log_path = path.into();
        self.sink = SinkKind::File;
        self
    }

    pub fn with_postgres(mut self, config: PostgresConfig) -> Self {
        self.postgres = Some(config);
        self.sink = SinkKind::Postgres;
        self
    }

    pub fn with_upstash(mut self, config: UpstashConfig) -> Self {
        self.upstash = Some(config);
        self.sink = SinkKind::Upstash;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Unset means default; set but unparsable is an error.
fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| {
            ConfigError::Invalid(format!("{} has an invalid value '{}'", name, value))
        }),
        Err(_) => Ok(None),
    }
}
