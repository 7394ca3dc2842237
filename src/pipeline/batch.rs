//! Batch bookkeeping.
//!
//! [`BatchBuilder`] owns the batch in progress and decides when it is
//! complete. It is plain synchronous state; the accumulator task is its
//! only owner, so nothing here needs a lock.

use std::time::Duration;

/// Size and age bounds for a batch.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Upper bound on the summed size of serialized records in a batch.
    pub max_batch_bytes: usize,
    /// A batch is flushed once its oldest record is older than this.
    pub max_log_age: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: 512 * 1024,
            max_log_age: Duration::from_secs(60),
        }
    }
}

/// Why a batch left the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The next record would have pushed the batch over `max_batch_bytes`.
    Size,
    /// The oldest record exceeded `max_log_age`.
    Age,
    /// A single record larger than `max_batch_bytes`, sent on its own.
    Oversize,
    /// Final flush while the pipeline shuts down.
    Drain,
}

impl FlushTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Age => "age",
            Self::Oversize => "oversize",
            Self::Drain => "drain",
        }
    }
}

/// An ordered group of serialized records.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: u64,
    entries: Vec<Vec<u8>>,
    aggregate_bytes: usize,
    oldest_created_at: Option<i64>,
}

impl Batch {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            entries: Vec::new(),
            aggregate_bytes: 0,
            oldest_created_at: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of serialized payload sizes.
    pub fn aggregate_bytes(&self) -> usize {
        self.aggregate_bytes
    }

    /// Earliest `dateCreated` among the batch's records (epoch ms).
    pub fn oldest_created_at(&self) -> Option<i64> {
        self.oldest_created_at
    }

    /// Serialized records in insertion order.
    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    /// Newline-delimited body: every record followed by `\n`.
    pub fn to_ndjson(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.aggregate_bytes + self.entries.len());
        for entry in &self.entries {
            body.extend_from_slice(entry);
            body.push(b'\n');
        }
        body
    }

    fn push(&mut self, payload: Vec<u8>, created_at: i64) {
        self.aggregate_bytes += payload.len();
        self.oldest_created_at = Some(match self.oldest_created_at {
            Some(oldest) => oldest.min(created_at),
            None => created_at,
        });
        self.entries.push(payload);
    }
}

/// Groups serialized records into size- and age-bounded batches.
pub struct BatchBuilder {
    config: BatchConfig,
    current: Batch,
    next_id: u64,
}

impl BatchBuilder {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            current: Batch::new(1),
            next_id: 2,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// The batch in progress.
    pub fn current(&self) -> &Batch {
        &self.current
    }

    /// Check if a payload fits in the current batch.
    pub fn can_add(&self, payload_len: usize) -> bool {
        self.current.aggregate_bytes + payload_len <= self.config.max_batch_bytes
    }

    /// Add a serialized record and return any batches that are now complete.
    ///
    /// At most one flush happens per trigger evaluation: when the size
    /// trigger fires the age check is skipped, and an aged record that
    /// started the new batch is picked up on the next evaluation.
    pub fn push(&mut self, payload: Vec<u8>, created_at: i64, now_ms: i64) -> Vec<(Batch, FlushTrigger)> {
        let mut flushed = Vec::new();

        if payload.len() > self.config.max_batch_bytes {
            flushed.extend(self.take(FlushTrigger::Size));
            let mut single = self.fresh_batch();
            single.push(payload, created_at);
            flushed.push((single, FlushTrigger::Oversize));
            return flushed;
        }

        if !self.can_add(payload.len()) {
            flushed.extend(self.take(FlushTrigger::Size));
        }
        self.current.push(payload, created_at);

        if flushed.is_empty() {
            flushed.extend(self.flush_if_expired(now_ms));
        }
        flushed
    }

    /// Whether the oldest record in the current batch is past `max_log_age`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.current
            .oldest_created_at
            .map_or(false, |oldest| now_ms.saturating_sub(oldest) > self.max_age_ms())
    }

    pub fn flush_if_expired(&mut self, now_ms: i64) -> Option<(Batch, FlushTrigger)> {
        if self.is_expired(now_ms) {
            self.take(FlushTrigger::Age)
        } else {
            None
        }
    }

    /// Time until the current batch expires. `None` while the batch is empty.
    pub fn time_until_expiry(&self, now_ms: i64) -> Option<Duration> {
        let oldest = self.current.oldest_created_at?;
        let remaining = oldest
            .saturating_add(self.max_age_ms())
            .saturating_sub(now_ms)
            .saturating_add(1);
        Some(Duration::from_millis(remaining.max(0) as u64))
    }

    /// Close the current batch if it holds anything.
    pub fn take(&mut self, trigger: FlushTrigger) -> Option<(Batch, FlushTrigger)> {
        if self.current.is_empty() {
            return None;
        }
        let next = self.fresh_batch();
        Some((std::mem::replace(&mut self.current, next), trigger))
    }

    fn fresh_batch(&mut self) -> Batch {
        let batch = Batch::new(self.next_id);
        self.next_id += 1;
        batch
    }

    fn max_age_ms(&self) -> i64 {
        i64::try_from(self.config.max_log_age.as_millis()).unwrap_or(i64::MAX)
    }
}
