// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gateway Telemetry
//!
//! Captures one record per HTTP request/response cycle, sanitizes it, and
//! ships records to a remote collector in size- and age-bounded NDJSON
//! batches. The request path never blocks on, or fails because of,
//! telemetry delivery.
//!
//! # Flow
//!
//! - **Sanitize**: header masking and body rewriting, once per record
//! - **Ingest**: records cross a channel to a single accumulator task
//! - **Batch**: flushed by size, by age, or alone when oversized
//! - **Deliver**: each batch on its own task, retried, then dropped with one report
//!
//! ```no_run
//! use std::sync::Arc;
//! use gateway_telemetry::{config, HttpSink, Pipeline, RequestRecord, ResponseRecord, TelemetryRecord};
//!
//! # async fn run() -> Result<(), gateway_telemetry::sink::SinkError> {
//! let cfg = config::load();
//! let sink = HttpSink::new(cfg.http_sink_config())?;
//! let pipeline = Pipeline::start(cfg.pipeline_config(), Arc::new(sink));
//!
//! let handle = pipeline.handle();
//! handle.enqueue(TelemetryRecord::new(RequestRecord::default(), ResponseRecord::default())).await;
//!
//! pipeline.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod record;
pub mod sanitize;
pub mod shutdown;
pub mod sink;
pub mod telemetry;

pub use pipeline::{Pipeline, PipelineConfig, PipelineHandle, ShutdownReport};
pub use record::{RequestRecord, ResponseRecord, TelemetryRecord};
pub use sanitize::{HeaderMask, Sanitizer, SanitizerOptions};
pub use sink::{HttpSink, HttpSinkConfig, MemorySink, Sink, SinkError};
