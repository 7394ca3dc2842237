// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Default sink: POST batches to the collector's bulk log endpoint.
//!
//! The body is newline-delimited JSON, the credential travels in
//! [`API_KEY_HEADER`], and a batch counts as accepted only when the
//! response body is a JSON object whose `message` is `"success"`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::{Sink, SinkError};
use crate::pipeline::Batch;

/// Header carrying the collector API key.
pub const API_KEY_HEADER: &str = "x-ft-api-key";

/// Bulk log endpoint used when none is configured.
pub const DEFAULT_API_URL: &str = "https://api.logging.eu-west-1.sandbox.firetail.app/logs/bulk";

/// Longest response body excerpt kept in a rejection error.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    pub api_url: String,
    pub api_key: String,
    /// Timeout for a single POST, including reading the response.
    pub request_timeout: Duration,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSinkConfig {
    /// Delivery is possible only with both an endpoint and a key.
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CollectorReply {
    message: Option<String>,
}

/// HTTPS collector sink.
pub struct HttpSink {
    client: reqwest::Client,
    config: HttpSinkConfig,
}

impl HttpSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpSinkConfig {
        &self.config
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, batch: Arc<Batch>) -> Result<(), SinkError> {
        if !self.config.is_configured() {
            return Err(SinkError::NotConfigured);
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(batch.to_ndjson())
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        match serde_json::from_slice::<CollectorReply>(&body) {
            Ok(CollectorReply { message: Some(m) }) if m == "success" => Ok(()),
            _ => Err(SinkError::Rejected {
                status,
                body: excerpt(&body),
            }),
        }
    }
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY {
        return text.into_owned();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
