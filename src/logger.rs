use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::env;
use std::io::{self, Write};
use std::time::{Duration, Instant};

static LOGGER: OnceCell<ServiceLogger> = OnceCell::new();

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::from_env())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_level_filter();
    LOGGER
        .set(ServiceLogger { config })
        .map_err(|_| "Logger already initialized".to_string())?;

    let logger = LOGGER
        .get()
        .ok_or_else(|| "Logger not available after initialization".to_string())?;
    log::set_logger(logger).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

/// One line of JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_file_location: bool,
    pub output_json: bool,
    pub timestamp_format: String,
    /// Dependencies below this level are dropped (hyper, aws-smithy, ...).
    pub dependency_level: LogLevel,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_file_location: false,
            output_json: false,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            dependency_level: LogLevel::Warn,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `LOG_FORMAT=json` selects production output; `LOG_LEVEL` sets the level.
    pub fn from_env() -> Self {
        let base = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => Self::production(),
            _ => Self::development(),
        };
        match env::var("LOG_LEVEL").ok().as_deref().and_then(LogLevel::parse) {
            Some(level) => base.with_level(level),
            None => base,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_colors: true,
            show_emojis: true,
            show_file_location: true,
            ..Default::default()
        }
    }
}

pub struct ServiceLogger {
    config: LoggerConfig,
}

impl ServiceLogger {
    fn is_own_target(target: &str) -> bool {
        target.starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn entry(&self, record: &Record) -> LogEntry {
        let location = if self.config.show_file_location {
            record
                .file()
                .map(|file| format!("{}:{}", file, record.line().unwrap_or(0)))
        } else {
            None
        };

        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::from_log_level(record.level()),
            target: record.target().to_string(),
            message: record.args().to_string(),
            location,
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let config = &self.config;
        let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
        let level = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };

        let mut output = if config.show_colors {
            format!(
                "{} [{}] {}: {}",
                timestamp.bright_black(),
                level.color(entry.level.color()).bold(),
                entry.target.bright_blue(),
                entry.message
            )
        } else {
            format!("{} [{}] {}: {}", timestamp, level, entry.target, entry.message)
        };

        if let Some(location) = &entry.location {
            if config.show_colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }
        output
    }
}

impl log::Log for ServiceLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        let threshold = if Self::is_own_target(metadata.target()) {
            self.config.min_level
        } else {
            self.config.min_level.max(self.config.dependency_level)
        };
        LogLevel::from_log_level(metadata.level()) >= threshold
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = self.entry(record);
        let line = if self.config.output_json {
            serde_json::to_string(&entry).unwrap_or_else(|_| entry.message.clone())
        } else {
            self.format_console(&entry)
        };

        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{}", line);
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Wall-clock timer for a single operation.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting timer: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stops the timer, logs the duration and returns it.
    pub fn stop(self) -> Duration {
        let duration = self.elapsed();
        log::debug!(
            "⏱️  Timer '{}' completed in {}ms",
            self.name,
            duration.as_millis()
        );
        duration
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_startup_info(app_name: &str, version: &str, address: &str) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!("🌐 Listening on http://{}", address);
}

pub fn log_config_info(config: &crate::config::Config) {
    let generation = &config.generation;
    log::info!("⚙️  Configuration loaded:");
    log::info!(
        "   Region: {}",
        config.bedrock.region.as_deref().unwrap_or("us-east-1")
    );
    log::info!(
        "   Credentials: {}",
        if config.bedrock.access_key.is_some() {
            "explicit keys"
        } else {
            "default chain"
        }
    );
    let mut aliases: Vec<&String> = generation.models.keys().collect();
    aliases.sort();
    log::info!("   Models: {:?}", aliases);
    log::info!(
        "   Output: {} x {}x{} ({}, cfg {})",
        generation.number_of_images,
        generation.width,
        generation.height,
        generation.quality,
        generation.cfg_scale
    );
    log::info!("   Timeout: {}s", generation.timeout.as_secs());
    log::info!("   Usage sink: {}", config.sink.as_str());
    log::info!("   CORS origin: {}", config.allowed_origin);
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert!(prod_config.output_json);
    }

    #[test]
    fn dependency_logs_are_filtered_harder() {
        let logger = ServiceLogger {
            config: LoggerConfig::development(),
        };
        let own = Metadata::builder()
            .level(Level::Debug)
            .target("rgenai_edit::handler")
            .build();
        let dependency = Metadata::builder()
            .level(Level::Info)
            .target("aws_smithy_runtime::client")
            .build();
        assert!(logger.enabled(&own));
        assert!(!logger.enabled(&dependency));
    }

    #[test]
    fn test_logger_initialization() {
        assert!(init_with_config(LoggerConfig::production()).is_ok());
        assert!(init_with_config(LoggerConfig::production()).is_err());
    }

    #[test]
    fn timer_reports_elapsed_time() {
        let timer = timer("unit");
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.stop() >= Duration::from_millis(2));
    }
}
