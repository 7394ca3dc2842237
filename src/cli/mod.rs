// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for operating the telemetry pipeline.
//!
//! ## Usage
//!
//! ```bash
//! gateway-telemetry config show         # Effective configuration
//! gateway-telemetry config validate     # Exit 0 when no warnings
//! gateway-telemetry replay records.ndjson
//! gateway-telemetry replay --dry-run -  # Batch stdin without delivering
//! ```

pub mod config_cmd;
pub mod replay_cmd;

use std::path::PathBuf;

pub use replay_cmd::{run_replay, ReplayOptions};

/// Pull `--config FILE` out of an argument list, returning it and the rest.
pub fn take_config_flag(args: &[String]) -> Result<(Option<PathBuf>, Vec<String>), String> {
    let mut path = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            match iter.next() {
                Some(value) => path = Some(PathBuf::from(value)),
                None => return Err("--config requires a file path".to_string()),
            }
        } else if let Some(value) = arg.strip_prefix("--config=") {
            path = Some(PathBuf::from(value));
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((path, rest))
}
