//! Pipeline configuration from environment variables and TOML files.
//!
//! Values come from `GATEWAY_TELEMETRY_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without
//! crashing. A TOML file may supply the same keys; environment variables
//! win over the file.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GATEWAY_TELEMETRY_API_URL` | sandbox bulk endpoint | Collector URL |
//! | `GATEWAY_TELEMETRY_API_KEY` | (empty) | Collector API key; empty disables delivery |
//! | `GATEWAY_TELEMETRY_MAX_BATCH_BYTES` | 524288 | Max batch size (bytes) |
//! | `GATEWAY_TELEMETRY_MAX_LOG_AGE_MS` | 60000 | Max record age before flush (ms) |
//! | `GATEWAY_TELEMETRY_QUEUE_CAPACITY` | 0 | Ingest queue capacity (0 = unbounded) |
//! | `GATEWAY_TELEMETRY_ENQUEUE_TIMEOUT_MS` | 100 | Max producer wait on a full queue (ms) |
//! | `GATEWAY_TELEMETRY_MAX_ATTEMPTS` | 3 | Delivery attempts per batch |
//! | `GATEWAY_TELEMETRY_RETRY_BACKOFF_MS` | 200 | First retry delay (ms), doubles |
//! | `GATEWAY_TELEMETRY_REQUEST_TIMEOUT_SECS` | 10 | Collector request timeout (secs) |
//! | `GATEWAY_TELEMETRY_SHUTDOWN_GRACE_SECS` | 5 | Shutdown grace period (secs) |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{Backpressure, BatchConfig, PipelineConfig, RetryPolicy};
use crate::sanitize::Sanitizer;
use crate::sink::http::{HttpSinkConfig, DEFAULT_API_URL};

const MIN_BATCH_BYTES: usize = 1024;

// Serialize env-mutating tests to avoid cross-test pollution.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
const MAX_ATTEMPTS_CEILING: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

/// All configuration, after defaults, file and environment are applied.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub api_url: String,
    pub api_key: String,
    pub batch: BatchConfig,
    /// Ingest queue capacity; 0 means unbounded.
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            batch: BatchConfig::default(),
            queue_capacity: 0,
            enqueue_timeout: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Keys accepted in a TOML config file. All optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    api_key: Option<String>,
    max_batch_bytes: Option<usize>,
    max_log_age_ms: Option<u64>,
    queue_capacity: Option<usize>,
    enqueue_timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    shutdown_grace_secs: Option<u64>,
}

/// Serializable summary of effective values. The API key is never shown.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub api_url: String,
    pub api_key_set: bool,
    pub max_batch_bytes: usize,
    pub max_log_age_ms: u64,
    pub queue_capacity: usize,
    pub enqueue_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Load configuration from environment variables.
pub fn load() -> EnvConfig {
    let mut config = EnvConfig::default();
    config.apply_env();
    config.normalize();
    config
}

/// Load configuration from a TOML file, then apply environment overrides.
pub fn load_file(path: &Path) -> Result<EnvConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut config = EnvConfig::from_toml(&text)?;
    config.apply_env();
    config.normalize();
    Ok(config)
}

impl EnvConfig {
    /// Parse TOML text over the defaults. No environment lookup.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        config.apply_file(file);
        config.normalize();
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.api_url {
            self.api_url = v;
        }
        if let Some(v) = file.api_key {
            self.api_key = v;
        }
        if let Some(v) = file.max_batch_bytes {
            self.batch.max_batch_bytes = v;
        }
        if let Some(v) = file.max_log_age_ms {
            self.batch.max_log_age = Duration::from_millis(v);
        }
        if let Some(v) = file.queue_capacity {
            self.queue_capacity = v;
        }
        if let Some(v) = file.enqueue_timeout_ms {
            self.enqueue_timeout = Duration::from_millis(v);
        }
        if let Some(v) = file.max_attempts {
            self.retry.max_attempts = v;
        }
        if let Some(v) = file.retry_backoff_ms {
            self.retry.backoff = Duration::from_millis(v);
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.shutdown_grace_secs {
            self.shutdown_grace = Duration::from_secs(v);
        }
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_string("GATEWAY_TELEMETRY_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = env_string("GATEWAY_TELEMETRY_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_MAX_BATCH_BYTES") {
            self.batch.max_batch_bytes = v;
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_MAX_LOG_AGE_MS") {
            self.batch.max_log_age = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_QUEUE_CAPACITY") {
            self.queue_capacity = v;
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_ENQUEUE_TIMEOUT_MS") {
            self.enqueue_timeout = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = v;
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_RETRY_BACKOFF_MS") {
            self.retry.backoff = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("GATEWAY_TELEMETRY_SHUTDOWN_GRACE_SECS") {
            self.shutdown_grace = Duration::from_secs(v);
        }
    }

    fn normalize(&mut self) {
        self.batch.max_batch_bytes = self.batch.max_batch_bytes.max(MIN_BATCH_BYTES);
        self.batch.max_log_age = self.batch.max_log_age.max(Duration::from_millis(1));
        self.retry.max_attempts = self.retry.max_attempts.clamp(1, MAX_ATTEMPTS_CEILING);
        self.request_timeout = self.request_timeout.max(Duration::from_secs(1));
        self.shutdown_grace = self.shutdown_grace.max(Duration::from_secs(1));
    }

    pub fn backpressure(&self) -> Backpressure {
        match self.queue_capacity {
            0 => Backpressure::Unbounded,
            capacity => Backpressure::Bounded { capacity, max_wait: self.enqueue_timeout },
        }
    }

    /// Pipeline parameters using the default sanitizer.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            batch: self.batch.clone(),
            backpressure: self.backpressure(),
            retry: self.retry.clone(),
            shutdown_grace: self.shutdown_grace,
            sanitizer: Sanitizer::default_sanitizer(),
        }
    }

    pub fn http_sink_config(&self) -> HttpSinkConfig {
        HttpSinkConfig {
            api_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            request_timeout: self.request_timeout,
        }
    }

    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            api_url: self.api_url.clone(),
            api_key_set: !self.api_key.is_empty(),
            max_batch_bytes: self.batch.max_batch_bytes,
            max_log_age_ms: self.batch.max_log_age.as_millis() as u64,
            queue_capacity: self.queue_capacity,
            enqueue_timeout_ms: self.enqueue_timeout.as_millis() as u64,
            max_attempts: self.retry.max_attempts,
            retry_backoff_ms: self.retry.backoff.as_millis() as u64,
            request_timeout_secs: self.request_timeout.as_secs(),
            shutdown_grace_secs: self.shutdown_grace.as_secs(),
        }
    }

    /// Human-readable warnings for settings that are legal but suspect.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.api_key.is_empty() {
            warnings.push("GATEWAY_TELEMETRY_API_KEY is empty; telemetry delivery is disabled".to_string());
        }
        if self.api_url.is_empty() {
            warnings.push("GATEWAY_TELEMETRY_API_URL is empty; telemetry delivery is disabled".to_string());
        } else if !self.api_url.starts_with("https://") && !self.api_url.starts_with("http://") {
            warnings.push(format!("GATEWAY_TELEMETRY_API_URL is not an http(s) URL: {}", self.api_url));
        }
        if self.queue_capacity > 0 && self.enqueue_timeout.is_zero() {
            warnings.push(
                "bounded queue with zero enqueue timeout drops records whenever the queue is full"
                    .to_string(),
            );
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: &[&str] = &[
        "GATEWAY_TELEMETRY_API_URL",
        "GATEWAY_TELEMETRY_API_KEY",
        "GATEWAY_TELEMETRY_MAX_BATCH_BYTES",
        "GATEWAY_TELEMETRY_MAX_LOG_AGE_MS",
        "GATEWAY_TELEMETRY_QUEUE_CAPACITY",
        "GATEWAY_TELEMETRY_ENQUEUE_TIMEOUT_MS",
        "GATEWAY_TELEMETRY_MAX_ATTEMPTS",
        "GATEWAY_TELEMETRY_RETRY_BACKOFF_MS",
        "GATEWAY_TELEMETRY_REQUEST_TIMEOUT_SECS",
        "GATEWAY_TELEMETRY_SHUTDOWN_GRACE_SECS",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert!(cfg.api_key.is_empty());
        assert_eq!(cfg.batch.max_batch_bytes, 512 * 1024);
        assert_eq!(cfg.batch.max_log_age, Duration::from_secs(60));
        assert_eq!(cfg.backpressure(), Backpressure::Unbounded);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GATEWAY_TELEMETRY_API_KEY", "secret");
        std::env::set_var("GATEWAY_TELEMETRY_MAX_BATCH_BYTES", "65536");
        std::env::set_var("GATEWAY_TELEMETRY_MAX_LOG_AGE_MS", "1500");
        std::env::set_var("GATEWAY_TELEMETRY_QUEUE_CAPACITY", "128");
        std::env::set_var("GATEWAY_TELEMETRY_ENQUEUE_TIMEOUT_MS", "25");
        let cfg = load();
        assert_eq!(cfg.api_key, "secret");
        assert_eq!(cfg.batch.max_batch_bytes, 65536);
        assert_eq!(cfg.batch.max_log_age, Duration::from_millis(1500));
        assert_eq!(
            cfg.backpressure(),
            Backpressure::Bounded { capacity: 128, max_wait: Duration::from_millis(25) }
        );
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GATEWAY_TELEMETRY_MAX_BATCH_BYTES", "lots");
        std::env::set_var("GATEWAY_TELEMETRY_MAX_ATTEMPTS", "-1");
        let cfg = load();
        assert_eq!(cfg.batch.max_batch_bytes, 512 * 1024);
        assert_eq!(cfg.retry.max_attempts, 3);
        clear_env_vars();
    }

    #[test]
    fn test_floors_and_clamps() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GATEWAY_TELEMETRY_MAX_BATCH_BYTES", "1");
        std::env::set_var("GATEWAY_TELEMETRY_MAX_ATTEMPTS", "99");
        std::env::set_var("GATEWAY_TELEMETRY_SHUTDOWN_GRACE_SECS", "0");
        let cfg = load();
        assert_eq!(cfg.batch.max_batch_bytes, MIN_BATCH_BYTES);
        assert_eq!(cfg.retry.max_attempts, MAX_ATTEMPTS_CEILING);
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(1));
        clear_env_vars();
    }

    #[test]
    fn test_toml_file_values() {
        let cfg = EnvConfig::from_toml(
            r#"
            api_url = "https://collector.internal/logs/bulk"
            api_key = "from-file"
            max_log_age_ms = 250
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api_url, "https://collector.internal/logs/bulk");
        assert_eq!(cfg.api_key, "from-file");
        assert_eq!(cfg.batch.max_log_age, Duration::from_millis(250));
        assert_eq!(cfg.retry.max_attempts, 5);
    }

    #[test]
    fn test_toml_unknown_key_is_rejected() {
        let err = EnvConfig::from_toml("max_batch_size = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_wins_over_file() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"api_key = \"file\"\nqueue_capacity = 4\n").unwrap();
        std::env::set_var("GATEWAY_TELEMETRY_API_KEY", "env");
        let cfg = load_file(file.path()).unwrap();
        assert_eq!(cfg.api_key, "env");
        assert_eq!(cfg.queue_capacity, 4);
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_hides_key() {
        let cfg = EnvConfig { api_key: "secret".into(), ..Default::default() };
        let eff = serde_json::to_string(&cfg.effective_config()).unwrap();
        assert!(!eff.contains("secret"));
        assert!(eff.contains("\"api_key_set\":true"));
    }

    #[test]
    fn test_warnings_flag_disabled_delivery() {
        let cfg = EnvConfig::default();
        assert!(cfg.warnings().iter().any(|w| w.contains("API_KEY")));
        let cfg = EnvConfig { api_key: "k".into(), ..Default::default() };
        assert!(cfg.warnings().is_empty());
    }
}
