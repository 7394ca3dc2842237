//! The single consumer of the ingest channel.
//!
//! The accumulator task is the only owner of the batch in progress. It
//! sleeps until either a record arrives or the current batch reaches its
//! age limit, so an idle pipeline costs nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::batch::{BatchBuilder, FlushTrigger};
use super::channel::{IngestReceiver, RecordDrop};
use super::dispatcher::Dispatcher;
use crate::record::now_millis;
use crate::sanitize::SanitizedRecord;
use crate::telemetry::PipelineStats;

/// Spawn the accumulator loop. It exits after draining once `shutdown`
/// fires or every sender is gone.
pub(crate) fn spawn_accumulator(
    rx: IngestReceiver,
    builder: BatchBuilder,
    dispatcher: Dispatcher,
    stats: Arc<PipelineStats>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut accumulator = Accumulator { builder, dispatcher, stats };
        accumulator.run(rx, shutdown).await;
    })
}

struct Accumulator {
    builder: BatchBuilder,
    dispatcher: Dispatcher,
    stats: Arc<PipelineStats>,
}

impl Accumulator {
    async fn run(&mut self, mut rx: IngestReceiver, shutdown: CancellationToken) {
        loop {
            let wait = self.builder.time_until_expiry(now_millis());
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::debug!("accumulator: shutdown signal received");
                    break;
                }
                next = rx.recv() => match next {
                    Some(record) => self.ingest(record),
                    None => {
                        tracing::debug!("accumulator: ingest channel closed");
                        break;
                    }
                },
                () = expiry(wait) => {
                    if let Some((batch, trigger)) = self.builder.flush_if_expired(now_millis()) {
                        self.dispatcher.dispatch(batch, trigger);
                    }
                }
            }
        }

        rx.close();
        while let Some(record) = rx.recv().await {
            self.ingest(record);
        }
        if let Some((batch, trigger)) = self.builder.take(FlushTrigger::Drain) {
            self.dispatcher.dispatch(batch, trigger);
        }
        tracing::debug!("accumulator: drained");
    }

    fn ingest(&mut self, record: SanitizedRecord) {
        self.ingest_encoded(serde_json::to_vec(record.record()), record.date_created());
    }

    /// Batch one encoded record. `TelemetryRecord` has no fallible fields
    /// today, so the error arm is reached only through tests.
    fn ingest_encoded(&mut self, encoded: serde_json::Result<Vec<u8>>, date_created: i64) {
        let payload = match encoded {
            Ok(payload) => payload,
            Err(e) => {
                let cause = RecordDrop::Serialization(e.to_string());
                tracing::warn!(error = %cause, "dropping telemetry record");
                self.stats.on_record_dropped(&cause);
                return;
            }
        };

        let size = payload.len();
        for (batch, trigger) in self.builder.push(payload, date_created, now_millis()) {
            if trigger == FlushTrigger::Oversize {
                tracing::warn!(
                    bytes = size,
                    max_batch_bytes = self.builder.config().max_batch_bytes,
                    "telemetry record exceeds max batch size, sending it alone"
                );
            }
            self.dispatcher.dispatch(batch, trigger);
        }
    }
}

/// Resolves when the current batch expires; never, while it is empty.
async fn expiry(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}
