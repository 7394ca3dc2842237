//! Ingest channel: many producers, one accumulator.
//!
//! Whether producers can be made to wait is an explicit
//! [`Backpressure`] choice. The unbounded variant never blocks and trades
//! memory for that; the bounded variant waits up to `max_wait` for room
//! and then drops the record.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::sanitize::SanitizedRecord;

/// Producer-side behaviour when the accumulator falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    /// Never block producers; the queue grows without limit.
    Unbounded,
    /// Hold at most `capacity` records; producers wait up to `max_wait`.
    Bounded { capacity: usize, max_wait: Duration },
}

impl Default for Backpressure {
    fn default() -> Self {
        Self::Unbounded
    }
}

/// Why a single record never reached a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordDrop {
    #[error("record could not be serialized: {0}")]
    Serialization(String),
    #[error("pipeline is shut down")]
    ChannelClosed,
    #[error("ingest queue full")]
    Backpressure,
}

impl RecordDrop {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "serialization",
            Self::ChannelClosed => "closed",
            Self::Backpressure => "backpressure",
        }
    }
}

pub(crate) fn ingest_channel(policy: Backpressure) -> (IngestSender, IngestReceiver) {
    match policy {
        Backpressure::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (IngestSender::Unbounded(tx), IngestReceiver::Unbounded(rx))
        }
        Backpressure::Bounded { capacity, max_wait } => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (IngestSender::Bounded { tx, max_wait }, IngestReceiver::Bounded(rx))
        }
    }
}

#[derive(Clone)]
pub(crate) enum IngestSender {
    Unbounded(mpsc::UnboundedSender<SanitizedRecord>),
    Bounded {
        tx: mpsc::Sender<SanitizedRecord>,
        max_wait: Duration,
    },
}

impl IngestSender {
    /// Send, waiting at most the configured `max_wait` when bounded.
    pub async fn send(&self, record: SanitizedRecord) -> Result<(), RecordDrop> {
        match self {
            Self::Unbounded(tx) => tx.send(record).map_err(|_| RecordDrop::ChannelClosed),
            Self::Bounded { tx, max_wait } => match tx.try_send(record) {
                Ok(()) => Ok(()),
                Err(mpsc::error::TrySendError::Closed(_)) => Err(RecordDrop::ChannelClosed),
                Err(mpsc::error::TrySendError::Full(record)) => {
                    if max_wait.is_zero() {
                        return Err(RecordDrop::Backpressure);
                    }
                    match tokio::time::timeout(*max_wait, tx.send(record)).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(_)) => Err(RecordDrop::ChannelClosed),
                        Err(_) => Err(RecordDrop::Backpressure),
                    }
                }
            },
        }
    }

    /// Send without waiting.
    pub fn try_send(&self, record: SanitizedRecord) -> Result<(), RecordDrop> {
        match self {
            Self::Unbounded(tx) => tx.send(record).map_err(|_| RecordDrop::ChannelClosed),
            Self::Bounded { tx, .. } => tx.try_send(record).map_err(|e| match e {
                mpsc::error::TrySendError::Closed(_) => RecordDrop::ChannelClosed,
                mpsc::error::TrySendError::Full(_) => RecordDrop::Backpressure,
            }),
        }
    }
}

pub(crate) enum IngestReceiver {
    Unbounded(mpsc::UnboundedReceiver<SanitizedRecord>),
    Bounded(mpsc::Receiver<SanitizedRecord>),
}

impl IngestReceiver {
    /// Next record, or `None` once closed and empty.
    pub async fn recv(&mut self) -> Option<SanitizedRecord> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }

    /// Refuse further sends; buffered records stay readable.
    pub fn close(&mut self) {
        match self {
            Self::Unbounded(rx) => rx.close(),
            Self::Bounded(rx) => rx.close(),
        }
    }
}
