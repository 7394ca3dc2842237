//! Fire-and-forget batch delivery with bounded retry.
//!
//! Each completed batch is delivered on its own task so a slow sink never
//! holds up the accumulator. A batch is retried as a whole; after the last
//! attempt fails it is dropped and reported exactly once.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::batch::{Batch, FlushTrigger};
use crate::shutdown::{DeliveryGuard, DeliveryTracker, InFlightBatch};
use crate::sink::{Sink, SinkError};
use crate::telemetry::{BatchSpan, PipelineStats, SpanExt};

/// Attempt budget for one batch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles for each later one. Zero disables.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    fn delay_before(&self, attempt: u32) -> Duration {
        // attempt is the one about to run, starting at 2
        let exp = attempt.saturating_sub(2).min(16);
        self.backoff.saturating_mul(1 << exp)
    }
}

/// A batch that was given up on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("dropped batch {batch_id} ({records} records) after {attempts} attempts: {last_error}")]
pub struct DeliveryFailure {
    pub batch_id: u64,
    pub records: usize,
    pub bytes: usize,
    pub attempts: u32,
    pub last_error: SinkError,
}

/// Receives every permanently dropped batch, once.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: &DeliveryFailure);
}

/// Reports drops as a single `error` log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailureReporter;

impl FailureReporter for LogFailureReporter {
    fn report(&self, failure: &DeliveryFailure) {
        tracing::error!(
            batch_id = failure.batch_id,
            records = failure.records,
            attempts = failure.attempts,
            error = %failure.last_error,
            "failed to deliver telemetry batch, dropping it"
        );
    }
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// No collector configured; discarded without retry or report.
    Discarded,
    Dropped(DeliveryFailure),
    /// Shutdown claimed the batch first and reported it as dropped.
    Abandoned,
}

#[derive(Clone)]
pub(crate) struct Dispatcher {
    sink: Arc<dyn Sink>,
    retry: RetryPolicy,
    reporter: Arc<dyn FailureReporter>,
    stats: Arc<PipelineStats>,
    tracker: Arc<DeliveryTracker>,
    abandon: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        sink: Arc<dyn Sink>,
        retry: RetryPolicy,
        reporter: Arc<dyn FailureReporter>,
        stats: Arc<PipelineStats>,
        tracker: Arc<DeliveryTracker>,
        abandon: CancellationToken,
    ) -> Self {
        Self { sink, retry, reporter, stats, tracker, abandon }
    }

    /// Hand a batch off to its own delivery task.
    pub fn dispatch(&self, batch: Batch, trigger: FlushTrigger) {
        self.stats.on_flushed(trigger, batch.aggregate_bytes());
        tracing::debug!(
            batch_id = batch.id(),
            records = batch.len(),
            bytes = batch.aggregate_bytes(),
            trigger = trigger.as_str(),
            "flushing telemetry batch"
        );

        let Some(guard) = self.tracker.track(&batch) else {
            let failure = DeliveryFailure {
                batch_id: batch.id(),
                records: batch.len(),
                bytes: batch.aggregate_bytes(),
                attempts: 0,
                last_error: SinkError::Transport("pipeline stopped before delivery".into()),
            };
            record_drop(self.reporter.as_ref(), &self.stats, &failure);
            return;
        };

        let batch = Arc::new(batch);
        let sink = self.sink.clone();
        let retry = self.retry.clone();
        let reporter = self.reporter.clone();
        let stats = self.stats.clone();
        let abandon = self.abandon.clone();

        tokio::spawn(async move {
            let delivery = deliver_tracked(
                sink.as_ref(),
                &retry,
                reporter.as_ref(),
                &stats,
                batch,
                Some(&guard),
            );
            tokio::select! {
                () = abandon.cancelled() => {
                    tracing::debug!(batch_id = guard.batch_id(), "in-flight telemetry batch cancelled");
                }
                _ = delivery => {}
            }
        });
    }
}

/// Report a permanently dropped batch and count it.
pub(crate) fn record_drop(
    reporter: &dyn FailureReporter,
    stats: &PipelineStats,
    failure: &DeliveryFailure,
) {
    reporter.report(failure);
    stats.on_batch_dropped();
}

impl DeliveryFailure {
    /// Failure for a delivery shutdown stopped waiting for.
    pub(crate) fn abandoned(batch: &InFlightBatch) -> Self {
        Self {
            batch_id: batch.batch_id,
            records: batch.records,
            bytes: batch.bytes,
            attempts: batch.attempts,
            last_error: SinkError::Transport("delivery abandoned at shutdown".into()),
        }
    }
}

/// Deliver one batch with retry. Reports a permanent drop exactly once.
pub async fn deliver(
    sink: &dyn Sink,
    retry: &RetryPolicy,
    reporter: &dyn FailureReporter,
    stats: &PipelineStats,
    batch: Arc<Batch>,
) -> DeliveryOutcome {
    deliver_tracked(sink, retry, reporter, stats, batch, None).await
}

async fn deliver_tracked(
    sink: &dyn Sink,
    retry: &RetryPolicy,
    reporter: &dyn FailureReporter,
    stats: &PipelineStats,
    batch: Arc<Batch>,
    guard: Option<&DeliveryGuard>,
) -> DeliveryOutcome {
    let span = BatchSpan::new(batch.id(), batch.len(), batch.aggregate_bytes());
    let outcome = attempt_delivery(sink, retry, batch.clone(), guard)
        .instrument(span.clone())
        .await;

    if matches!(guard, Some(guard) if !guard.settle()) {
        tracing::debug!(batch_id = batch.id(), "delivery settled after shutdown claimed it");
        return DeliveryOutcome::Abandoned;
    }

    match outcome {
        Ok(attempts) => {
            span.record_attempts(attempts);
            span.record_result::<(), SinkError>(&Ok(()));
            stats.on_delivered(batch.len(), batch.aggregate_bytes(), attempts);
            DeliveryOutcome::Delivered { attempts }
        }
        Err((_, SinkError::NotConfigured)) => {
            stats.on_discarded();
            DeliveryOutcome::Discarded
        }
        Err((attempts, last_error)) => {
            span.record_attempts(attempts);
            span.record_result::<(), _>(&Err(&last_error));
            let failure = DeliveryFailure {
                batch_id: batch.id(),
                records: batch.len(),
                bytes: batch.aggregate_bytes(),
                attempts,
                last_error,
            };
            record_drop(reporter, stats, &failure);
            DeliveryOutcome::Dropped(failure)
        }
    }
}

async fn attempt_delivery(
    sink: &dyn Sink,
    retry: &RetryPolicy,
    batch: Arc<Batch>,
    guard: Option<&DeliveryGuard>,
) -> Result<u32, (u32, SinkError)> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if let Some(guard) = guard {
            guard.attempt_started();
        }
        match sink.send(batch.clone()).await {
            Ok(()) => {
                tracing::debug!(attempt, "telemetry batch delivered");
                return Ok(attempt);
            }
            Err(e) if !e.is_transient() => {
                tracing::debug!(error = %e, "telemetry delivery disabled, discarding batch");
                return Err((attempt, e));
            }
            Err(e) if attempt >= max_attempts => return Err((attempt, e)),
            Err(e) => {
                tracing::debug!(attempt, error = %e, "telemetry delivery failed, retrying");
                attempt += 1;
                let delay = retry.delay_before(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
