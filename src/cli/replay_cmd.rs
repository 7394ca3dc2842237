// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Replay subcommand: feed NDJSON telemetry records through the pipeline.
//!
//! Each input line is one serialized [`TelemetryRecord`]. Records pass
//! through the normal sanitize, batch and deliver path. With `--dry-run`
//! batches go to an in-memory sink and nothing leaves the process.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::pipeline::{Pipeline, PipelineHandle};
use crate::record::TelemetryRecord;
use crate::sink::{HttpSink, MemorySink, Sink};

use super::config_cmd;

/// Parsed `replay` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Input file; `None` or `-` reads stdin.
    pub input: Option<PathBuf>,
    pub dry_run: bool,
    pub config: Option<PathBuf>,
}

impl ReplayOptions {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let (config, rest) = super::take_config_flag(args)?;
        let mut options = Self { config, ..Self::default() };
        for arg in rest {
            match arg.as_str() {
                "--dry-run" => options.dry_run = true,
                "-" => options.input = None,
                flag if flag.starts_with("--") => return Err(format!("unknown option: {}", flag)),
                path => {
                    if options.input.is_some() {
                        return Err("replay accepts a single input path".to_string());
                    }
                    options.input = Some(PathBuf::from(path));
                }
            }
        }
        Ok(options)
    }
}

/// Line counts from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub lines: u64,
    pub enqueued: u64,
    pub skipped: u64,
}

/// Run a replay to completion. Returns the process exit code.
pub async fn run_replay(options: ReplayOptions) -> i32 {
    let cfg = match config_cmd::resolve(options.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return 2;
        }
    };

    let memory = Arc::new(MemorySink::new());
    let sink: Arc<dyn Sink> = if options.dry_run {
        memory.clone()
    } else {
        match HttpSink::new(cfg.http_sink_config()) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return 2;
            }
        }
    };

    let pipeline = Pipeline::start(cfg.pipeline_config(), sink);
    let handle = pipeline.handle();

    let replay = async {
        match &options.input {
            Some(path) => {
                let file = tokio::fs::File::open(path).await?;
                replay_lines(BufReader::new(file), &handle).await
            }
            None => replay_lines(BufReader::new(tokio::io::stdin()), &handle).await,
        }
    };

    let summary = tokio::select! {
        result = replay => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down telemetry pipeline");
            Ok(ReplaySummary::default())
        }
    };
    drop(handle);
    let report = pipeline.shutdown().await;

    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("ERROR: failed to read input: {}", e);
            return 1;
        }
    };

    let output = serde_json::json!({
        "replay": summary,
        "dry_run": options.dry_run,
        "batches_captured": memory.batch_count(),
        "stats": report.stats,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("ERROR: {}", e),
    }

    if report.stats.batches_dropped > 0 {
        1
    } else {
        0
    }
}

/// Enqueue every parseable line from `reader`; blank lines are ignored.
pub async fn replay_lines<R>(reader: R, handle: &PipelineHandle) -> std::io::Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;
        match serde_json::from_str::<TelemetryRecord>(&line) {
            Ok(record) => {
                handle.enqueue(record).await;
                summary.enqueued += 1;
            }
            Err(e) => {
                tracing::warn!(line = summary.lines, error = %e, "skipping malformed telemetry record");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use std::time::Duration;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_defaults_to_stdin() {
        let options = ReplayOptions::parse(&[]).unwrap();
        assert_eq!(options, ReplayOptions::default());
    }

    #[test]
    fn test_parse_all_flags() {
        let options =
            ReplayOptions::parse(&args(&["--dry-run", "--config", "c.toml", "in.ndjson"])).unwrap();
        assert!(options.dry_run);
        assert_eq!(options.config, Some(PathBuf::from("c.toml")));
        assert_eq!(options.input, Some(PathBuf::from("in.ndjson")));
    }

    #[test]
    fn test_parse_rejects_unknown_flag_and_second_path() {
        assert!(ReplayOptions::parse(&args(&["--fast"])).is_err());
        assert!(ReplayOptions::parse(&args(&["a", "b"])).is_err());
    }

    #[tokio::test]
    async fn test_replay_lines_skips_malformed() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = Pipeline::start(PipelineConfig::default(), sink.clone());
        let handle = pipeline.handle();

        let record = serde_json::to_string(&TelemetryRecord::new(Default::default(), Default::default())).unwrap();
        let input = format!("{record}\nnot json\n\n{record}\n");
        let summary = replay_lines(BufReader::new(input.as_bytes()), &handle).await.unwrap();

        assert_eq!(summary, ReplaySummary { lines: 3, enqueued: 2, skipped: 1 });
        drop(handle);
        let report = pipeline.shutdown().await;
        assert_eq!(report.stats.records_enqueued, 2);
        assert!(sink.wait_for_batches(1, Duration::from_secs(1)).await);
        assert_eq!(sink.record_count(), 2);
    }
}
