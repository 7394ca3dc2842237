// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gateway Telemetry command-line entry point.
//!
//! ## CLI Subcommands
//!
//! - `gateway-telemetry config show|defaults|validate` - Inspect configuration
//! - `gateway-telemetry replay [PATH|-]` - Ship NDJSON records through the pipeline
//! - `gateway-telemetry version` - Print the version

use std::process::ExitCode;

use gateway_telemetry::cli::{config_cmd, take_config_flag, ReplayOptions};
use gateway_telemetry::telemetry::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(2u8);
    }

    match command {
        "replay" => match ReplayOptions::parse(&args[2..]) {
            Ok(options) => {
                let code = gateway_telemetry::cli::run_replay(options).await;
                ExitCode::from(code as u8)
            }
            Err(e) => {
                eprintln!("{}", e);
                print_command_help("replay");
                ExitCode::FAILURE
            }
        },
        "config" => {
            let (path, rest) = match take_config_flag(&args[2..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => ExitCode::from(config_cmd::run_show(path.as_deref()) as u8),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate(path.as_deref()) as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("gateway-telemetry {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "gateway-telemetry - API gateway telemetry batching pipeline v{}

USAGE:
    gateway-telemetry <COMMAND> [OPTIONS]

COMMANDS:
    replay       Send NDJSON telemetry records through the pipeline
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    gateway-telemetry replay captured.ndjson
    gateway-telemetry replay --dry-run - < captured.ndjson
    gateway-telemetry config validate --config /etc/gateway-telemetry.toml

ENVIRONMENT:
    GATEWAY_TELEMETRY_API_URL     Collector bulk endpoint
    GATEWAY_TELEMETRY_API_KEY     Collector API key (empty disables delivery)
    GATEWAY_TELEMETRY_LOG_FORMAT  Log format (json, pretty, compact)
    RUST_LOG                      Log level (debug, info, warn, error)

EXIT CODES:
    0  Success
    1  Failure, warnings, or dropped batches
    2  Configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "replay" => {
            eprintln!(
                "gateway-telemetry replay - Replay captured records

USAGE:
    gateway-telemetry replay [OPTIONS] [PATH|-]

OPTIONS:
    --config FILE  Load configuration from a TOML file
    --dry-run      Batch records in memory without contacting the collector

DESCRIPTION:
    Reads one JSON telemetry record per line from PATH, or stdin when PATH
    is '-' or omitted. Records are sanitized, batched and delivered exactly
    as a live gateway would. Prints a JSON summary on completion.
"
            );
        }
        "config" => {
            eprintln!(
                "gateway-telemetry config - Inspect configuration

USAGE:
    gateway-telemetry config <SUBCOMMAND> [--config FILE]

SUBCOMMANDS:
    show           Show effective configuration
    validate       Warn about suspect settings (exit 1 on warnings)
    defaults       Show default configuration
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'gateway-telemetry help' for general usage.",
                command
            );
        }
    }
}
