//! In-memory sink that keeps every accepted batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{Sink, SinkError};
use crate::pipeline::Batch;

/// Collects batches locally. Used for dry runs and tests.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Arc<Batch>>>,
    notify: Notify,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of accepted batches in acceptance order.
    pub fn batches(&self) -> Vec<Arc<Batch>> {
        self.batches.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn record_count(&self) -> usize {
        self.batches.lock().iter().map(|b| b.len()).sum()
    }

    pub fn total_bytes(&self) -> usize {
        self.batches.lock().iter().map(|b| b.aggregate_bytes()).sum()
    }

    /// Wait until at least `count` batches arrived. Returns false on timeout.
    pub async fn wait_for_batches(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.batch_count() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.batch_count() >= count;
            }
        }
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn send(&self, batch: Arc<Batch>) -> Result<(), SinkError> {
        self.batches.lock().push(batch);
        self.notify.notify_waiters();
        Ok(())
    }
}
