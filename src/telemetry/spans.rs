//! Span helpers for batch delivery.

use tracing::{info_span, Span};

/// Extension trait for recording an outcome into a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;

    fn record_attempts(&self, attempts: u32);
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }

    fn record_attempts(&self, attempts: u32) {
        self.record("attempts", attempts);
    }
}

/// Factory for the span wrapping one batch's delivery.
pub struct BatchSpan;

impl BatchSpan {
    /// Fields `status`, `error.message` and `attempts` are filled in later.
    pub fn new(batch_id: u64, records: usize, bytes: usize) -> Span {
        info_span!(
            "batch_dispatch",
            batch_id = batch_id,
            records = records,
            bytes = bytes,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            attempts = tracing::field::Empty,
        )
    }
}
