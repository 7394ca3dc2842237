//! Logging configuration and initialization.
//!
//! The library only emits `tracing` events; binaries and tests decide
//! where they go by calling [`init_logging`] once.

use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON lines (default for deployed middleware).
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `"info"` or `"gateway_telemetry=debug"`.
    pub level: String,
    /// Write to this file instead of stderr.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `RUST_LOG` and `GATEWAY_TELEMETRY_LOG_FORMAT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("RUST_LOG") {
            if !level.is_empty() {
                config.level = level;
            }
        }
        if let Some(format) = std::env::var("GATEWAY_TELEMETRY_LOG_FORMAT")
            .ok()
            .and_then(|f| LogFormat::parse(&f))
        {
            config.format = format;
        }
        config
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::InvalidFilter(e.to_string()))?;

    match (&config.output_path, config.format) {
        (Some(path), format) => {
            let file = std::fs::File::create(path)
                .map_err(|e| LogError::FileOpen(e.to_string()))?;
            let writer = std::sync::Mutex::new(file);
            let registry = tracing_subscriber::registry().with(filter);
            match format {
                LogFormat::Json => registry.with(fmt::layer().json().with_writer(writer)).try_init(),
                LogFormat::Pretty => registry
                    .with(fmt::layer().pretty().with_ansi(false).with_writer(writer))
                    .try_init(),
                LogFormat::Compact => registry
                    .with(fmt::layer().compact().with_ansi(false).with_writer(writer))
                    .try_init(),
            }
        }
        (None, LogFormat::Json) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        (None, LogFormat::Pretty) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        (None, LogFormat::Compact) => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|_| LogError::AlreadyInitialized)
}
