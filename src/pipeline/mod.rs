//! The batching and delivery pipeline.
//!
//! Producers call [`PipelineHandle::enqueue`]; records are sanitized once,
//! cross the ingest channel, get grouped by the accumulator into size- and
//! age-bounded batches, and each batch is delivered to the [`Sink`] on its
//! own task. Nothing in this path returns an error to the producer.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gateway_telemetry::pipeline::{Pipeline, PipelineConfig};
//! use gateway_telemetry::sink::MemorySink;
//!
//! # async fn run() {
//! let pipeline = Pipeline::start(PipelineConfig::default(), Arc::new(MemorySink::new()));
//! let handle = pipeline.handle();
//! // handle.enqueue(record).await;
//! let report = pipeline.shutdown().await;
//! println!("{:?}", report.stats);
//! # }
//! ```

mod accumulator;
mod batch;
mod channel;
mod dispatcher;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use batch::{Batch, BatchBuilder, BatchConfig, FlushTrigger};
pub use channel::{Backpressure, RecordDrop};
pub use dispatcher::{
    deliver, DeliveryFailure, DeliveryOutcome, FailureReporter, LogFailureReporter, RetryPolicy,
};

use crate::record::TelemetryRecord;
use crate::sanitize::{SanitizedRecord, Sanitizer};
use crate::shutdown::{DeliveryTracker, ShutdownResult};
use crate::sink::Sink;
use crate::telemetry::{PipelineStats, StatsSnapshot};
use channel::IngestSender;
use dispatcher::Dispatcher;

/// Pipeline parameters, fixed at start.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch: BatchConfig,
    pub backpressure: Backpressure,
    pub retry: RetryPolicy,
    /// Total time shutdown spends draining the queue and waiting for
    /// in-flight deliveries.
    pub shutdown_grace: Duration,
    pub sanitizer: Sanitizer,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            backpressure: Backpressure::default(),
            retry: RetryPolicy::default(),
            shutdown_grace: Duration::from_secs(5),
            sanitizer: Sanitizer::default_sanitizer(),
        }
    }
}

/// Summary returned by [`Pipeline::shutdown`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    /// The accumulator flushed everything it had queued.
    pub drained: bool,
    pub in_flight: ShutdownResult,
    pub stats: StatsSnapshot,
}

/// A running pipeline instance.
pub struct Pipeline {
    handle: PipelineHandle,
    worker: JoinHandle<()>,
    shutdown: CancellationToken,
    abandon: CancellationToken,
    tracker: Arc<DeliveryTracker>,
    reporter: Arc<dyn FailureReporter>,
    stats: Arc<PipelineStats>,
    grace: Duration,
}

impl Pipeline {
    /// Start a pipeline that reports dropped batches through the log.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: PipelineConfig, sink: Arc<dyn Sink>) -> Self {
        Self::start_with_reporter(config, sink, Arc::new(LogFailureReporter))
    }

    pub fn start_with_reporter(
        config: PipelineConfig,
        sink: Arc<dyn Sink>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        let (tx, rx) = channel::ingest_channel(config.backpressure);
        let stats = Arc::new(PipelineStats::new());
        let tracker = Arc::new(DeliveryTracker::new());
        let shutdown = CancellationToken::new();
        let abandon = CancellationToken::new();

        let dispatcher = Dispatcher::new(
            sink,
            config.retry.clone(),
            reporter.clone(),
            stats.clone(),
            tracker.clone(),
            abandon.clone(),
        );
        let worker = accumulator::spawn_accumulator(
            rx,
            BatchBuilder::new(config.batch.clone()),
            dispatcher,
            stats.clone(),
            shutdown.clone(),
        );

        tracing::info!(
            max_batch_bytes = config.batch.max_batch_bytes,
            max_log_age_ms = config.batch.max_log_age.as_millis() as u64,
            backpressure = ?config.backpressure,
            "telemetry pipeline started"
        );

        Self {
            handle: PipelineHandle {
                tx,
                sanitizer: Arc::new(config.sanitizer),
                stats: stats.clone(),
            },
            worker,
            shutdown,
            abandon,
            tracker,
            reporter,
            stats,
            grace: config.shutdown_grace,
        }
    }

    /// A cloneable producer handle.
    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop intake, flush what is queued, and wait for in-flight deliveries.
    ///
    /// Both waits share one deadline, `shutdown_grace` from now. Deliveries
    /// still running at the deadline are cancelled and reported as dropped.
    pub async fn shutdown(self) -> ShutdownReport {
        tracing::info!("telemetry pipeline shutting down");
        self.shutdown.cancel();
        let deadline = tokio::time::Instant::now() + self.grace;

        let drained = match tokio::time::timeout_at(deadline, self.worker).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "accumulator task failed");
                false
            }
            Err(_) => {
                tracing::warn!("accumulator did not drain within the grace period");
                false
            }
        };

        let in_flight = self.tracker.drain(deadline).await;
        if let ShutdownResult::Timeout { abandoned } = &in_flight {
            tracing::warn!(remaining = abandoned.len(), "abandoning in-flight telemetry deliveries");
            self.abandon.cancel();
            for batch in abandoned {
                let failure = DeliveryFailure::abandoned(batch);
                dispatcher::record_drop(self.reporter.as_ref(), &self.stats, &failure);
            }
        }

        let stats = self.stats.snapshot();
        tracing::info!(
            delivered = stats.batches_delivered,
            dropped = stats.batches_dropped,
            "telemetry pipeline stopped"
        );
        ShutdownReport { drained, in_flight, stats }
    }
}

/// Producer side of a pipeline. Cheap to clone; never fails the caller.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: IngestSender,
    sanitizer: Arc<Sanitizer>,
    stats: Arc<PipelineStats>,
}

impl PipelineHandle {
    /// Sanitize and enqueue a record.
    ///
    /// Returns immediately on an unbounded channel; on a bounded one it
    /// may wait up to the configured `max_wait` before dropping the record.
    pub async fn enqueue(&self, record: TelemetryRecord) {
        self.enqueue_sanitized(self.sanitizer.sanitize(record)).await;
    }

    /// Enqueue a record already passed through a [`Sanitizer`].
    pub async fn enqueue_sanitized(&self, record: SanitizedRecord) {
        let result = self.tx.send(record).await;
        self.settle(result);
    }

    /// Sanitize and enqueue without ever waiting; a full queue drops the record.
    pub fn enqueue_now(&self, record: TelemetryRecord) {
        let result = self.tx.try_send(self.sanitizer.sanitize(record));
        self.settle(result);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn settle(&self, result: Result<(), RecordDrop>) {
        match result {
            Ok(()) => self.stats.on_enqueued(),
            Err(cause @ RecordDrop::ChannelClosed) => {
                tracing::debug!(error = %cause, "dropping telemetry record");
                self.stats.on_record_dropped(&cause);
            }
            Err(cause) => {
                tracing::warn!(error = %cause, "dropping telemetry record");
                self.stats.on_record_dropped(&cause);
            }
        }
    }
}
