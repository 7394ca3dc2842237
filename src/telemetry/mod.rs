//! Telemetry about the telemetry pipeline itself.
//!
//! Structured logging setup, delivery spans, `metrics` facade counters and
//! the per-pipeline [`PipelineStats`].

mod logging;
mod metrics;
mod spans;
mod stats;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use spans::{BatchSpan, SpanExt};
pub use stats::{PipelineStats, StatsSnapshot};
