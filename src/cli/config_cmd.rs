// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration from environment variables, or from a
//! TOML file with environment overrides when `--config FILE` is given.

use std::path::Path;

use crate::config::{self, EffectiveConfig, EnvConfig};

/// Resolve configuration from an optional file plus the environment.
pub fn resolve(path: Option<&Path>) -> Result<EnvConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_file(path),
        None => Ok(config::load()),
    }
}

/// Print effective config as key-value pairs to stdout.
pub fn run_show(path: Option<&Path>) -> i32 {
    match resolve(path) {
        Ok(cfg) => {
            print_config(&cfg.effective_config());
            0
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            2
        }
    }
}

/// Print default config values (no file or env overrides) to stdout.
pub fn run_defaults() {
    print_config(&EnvConfig::default().effective_config());
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if the file is unusable.
pub fn run_validate(path: Option<&Path>) -> i32 {
    let cfg = match resolve(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 2;
        }
    };

    let warnings = cfg.warnings();
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }

    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("GATEWAY_TELEMETRY_API_URL={}", cfg.api_url);
    println!(
        "GATEWAY_TELEMETRY_API_KEY={}",
        if cfg.api_key_set { "<set>" } else { "<unset>" }
    );
    println!("GATEWAY_TELEMETRY_MAX_BATCH_BYTES={}", cfg.max_batch_bytes);
    println!("GATEWAY_TELEMETRY_MAX_LOG_AGE_MS={}", cfg.max_log_age_ms);
    println!("GATEWAY_TELEMETRY_QUEUE_CAPACITY={}", cfg.queue_capacity);
    println!("GATEWAY_TELEMETRY_ENQUEUE_TIMEOUT_MS={}", cfg.enqueue_timeout_ms);
    println!("GATEWAY_TELEMETRY_MAX_ATTEMPTS={}", cfg.max_attempts);
    println!("GATEWAY_TELEMETRY_RETRY_BACKOFF_MS={}", cfg.retry_backoff_ms);
    println!("GATEWAY_TELEMETRY_REQUEST_TIMEOUT_SECS={}", cfg.request_timeout_secs);
    println!("GATEWAY_TELEMETRY_SHUTDOWN_GRACE_SECS={}", cfg.shutdown_grace_secs);
}
