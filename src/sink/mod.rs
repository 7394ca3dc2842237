// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Batch delivery strategies.
//!
//! A [`Sink`] receives one complete batch per call and either accepts all
//! of it or fails; there is no partial acceptance.

pub mod http;
mod memory;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::Batch;

pub use http::{HttpSink, HttpSinkConfig, API_KEY_HEADER};
pub use memory::MemorySink;

/// Errors a sink can report for a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// Endpoint or credential missing; delivery is switched off.
    #[error("collector endpoint or API key not configured")]
    NotConfigured,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("collector rejected batch (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

impl SinkError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotConfigured)
    }
}

/// Delivery strategy for a completed batch.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, batch: Arc<Batch>) -> Result<(), SinkError>;
}

/// Sink backed by an async closure.
pub struct FnSink<F> {
    f: F,
}

/// Wrap a closure as a [`Sink`].
///
/// ```
/// use gateway_telemetry::sink::{sink_fn, SinkError};
///
/// let sink = sink_fn(|batch| async move {
///     println!("{} records", batch.len());
///     Ok::<(), SinkError>(())
/// });
/// # let _ = sink;
/// ```
pub fn sink_fn<F, Fut>(f: F) -> FnSink<F>
where
    F: Fn(Arc<Batch>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SinkError>> + Send + 'static,
{
    FnSink { f }
}

#[async_trait]
impl<F, Fut> Sink for FnSink<F>
where
    F: Fn(Arc<Batch>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SinkError>> + Send + 'static,
{
    async fn send(&self, batch: Arc<Batch>) -> Result<(), SinkError> {
        (self.f)(batch).await
    }
}
