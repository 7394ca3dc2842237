//! In-flight delivery registry for pipeline shutdown.
//!
//! Every spawned delivery registers its batch with the [`DeliveryTracker`]
//! and holds a [`DeliveryGuard`] while the sink call runs. A delivery must
//! [`settle`](DeliveryGuard::settle) before it records its own outcome.
//! Shutdown closes the registry, waits until a deadline for it to empty,
//! and then claims whatever is left. A claimed batch can no longer settle,
//! so each batch ends up accounted for by exactly one side.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::pipeline::Batch;

/// A batch whose delivery had not settled when shutdown gave up on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightBatch {
    pub batch_id: u64,
    pub records: usize,
    pub bytes: usize,
    /// Sink calls started before the batch was abandoned.
    pub attempts: u32,
}

/// Outcome of waiting for in-flight deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    /// The deadline passed with these deliveries still running.
    Timeout { abandoned: Vec<InFlightBatch> },
}

impl ShutdownResult {
    /// Number of deliveries abandoned at the deadline.
    pub fn abandoned_count(&self) -> usize {
        match self {
            Self::Complete => 0,
            Self::Timeout { abandoned } => abandoned.len(),
        }
    }
}

#[derive(Default)]
struct Registry {
    closed: bool,
    in_flight: HashMap<u64, InFlightBatch>,
}

#[derive(Default)]
struct Shared {
    registry: Mutex<Registry>,
    settled: Notify,
}

impl Shared {
    /// Remove `batch_id` if nobody claimed it yet.
    fn release(&self, batch_id: u64) -> bool {
        let removed = self.registry.lock().in_flight.remove(&batch_id).is_some();
        if removed {
            self.settled.notify_waiters();
        }
        removed
    }
}

/// Registry of batches currently being delivered.
#[derive(Default)]
pub struct DeliveryTracker {
    shared: Arc<Shared>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delivery of `batch`. Returns `None` once the tracker is closed.
    pub fn track(&self, batch: &Batch) -> Option<DeliveryGuard> {
        let mut registry = self.shared.registry.lock();
        if registry.closed {
            return None;
        }
        registry.in_flight.insert(
            batch.id(),
            InFlightBatch {
                batch_id: batch.id(),
                records: batch.len(),
                bytes: batch.aggregate_bytes(),
                attempts: 0,
            },
        );
        Some(DeliveryGuard { shared: self.shared.clone(), batch_id: batch.id() })
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.registry.lock().in_flight.len()
    }

    /// Refuse new deliveries and wait until `deadline` for running ones.
    ///
    /// Deliveries still registered at the deadline are claimed and returned;
    /// their guards will no longer settle.
    pub async fn drain(&self, deadline: Instant) -> ShutdownResult {
        self.shared.registry.lock().closed = true;

        loop {
            // Armed before the check so a release in between is not missed.
            let settled = self.shared.settled.notified();
            if self.in_flight_count() == 0 {
                return ShutdownResult::Complete;
            }
            if tokio::time::timeout_at(deadline, settled).await.is_err() {
                break;
            }
        }

        let mut abandoned: Vec<InFlightBatch> = self
            .shared
            .registry
            .lock()
            .in_flight
            .drain()
            .map(|(_, batch)| batch)
            .collect();
        if abandoned.is_empty() {
            return ShutdownResult::Complete;
        }
        abandoned.sort_by_key(|batch| batch.batch_id);
        ShutdownResult::Timeout { abandoned }
    }
}

/// Held by one in-flight delivery. Dropping it without settling releases
/// the registration silently.
pub struct DeliveryGuard {
    shared: Arc<Shared>,
    batch_id: u64,
}

impl DeliveryGuard {
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    /// Note that another sink call is starting.
    pub fn attempt_started(&self) {
        if let Some(batch) = self.shared.registry.lock().in_flight.get_mut(&self.batch_id) {
            batch.attempts += 1;
        }
    }

    /// Take ownership of the outcome. `false` means shutdown already
    /// claimed the batch as abandoned.
    pub fn settle(&self) -> bool {
        self.shared.release(self.batch_id)
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        self.shared.release(self.batch_id);
    }
}
