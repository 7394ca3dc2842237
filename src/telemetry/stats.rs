//! Per-pipeline counters.
//!
//! Every counter update also goes to the `metrics` facade so hosts with an
//! exporter see the same numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::metrics;
use crate::pipeline::{FlushTrigger, RecordDrop};

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub records_enqueued: u64,
    pub records_dropped: u64,
    pub batches_flushed: u64,
    pub batches_delivered: u64,
    pub batches_dropped: u64,
    /// Batches discarded because no collector is configured.
    pub batches_discarded: u64,
    pub records_delivered: u64,
    pub bytes_delivered: u64,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    records_enqueued: AtomicU64,
    records_dropped: AtomicU64,
    batches_flushed: AtomicU64,
    batches_delivered: AtomicU64,
    batches_dropped: AtomicU64,
    batches_discarded: AtomicU64,
    records_delivered: AtomicU64,
    bytes_delivered: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enqueued(&self) {
        self.records_enqueued.fetch_add(1, Ordering::Relaxed);
        metrics::record_enqueued();
    }

    pub fn on_record_dropped(&self, cause: &RecordDrop) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_record_dropped(cause.reason());
    }

    pub fn on_flushed(&self, trigger: FlushTrigger, bytes: usize) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        metrics::record_batch_flushed(trigger.as_str(), bytes);
    }

    pub fn on_delivered(&self, records: usize, bytes: usize, attempts: u32) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.records_delivered.fetch_add(records as u64, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(bytes as u64, Ordering::Relaxed);
        metrics::record_batch_delivered(attempts);
    }

    pub fn on_batch_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_batch_dropped();
    }

    pub fn on_discarded(&self) {
        self.batches_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_enqueued: self.records_enqueued.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            batches_discarded: self.batches_discarded.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
        }
    }
}
