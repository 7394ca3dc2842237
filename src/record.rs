// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry record data model.
//!
//! One record describes a single request/response cycle observed by the
//! middleware. Field names on the wire follow the collector's bulk log
//! format (`dateCreated`, `executionTime`, `httpProtocol`, ...).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Version stamped on every record produced by this crate.
pub const RECORD_VERSION: &str = "1.0.0-alpha";

/// Header name to ordered header values.
pub type Headers = BTreeMap<String, Vec<String>>;

/// HTTP protocol version of the captured request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpProtocol {
    Http10,
    #[default]
    Http11,
    Http2,
    Http3,
    Other(String),
}

impl HttpProtocol {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
            Self::Http3 => "HTTP/3",
            Self::Other(s) => s,
        }
    }

    /// Parse a protocol string. Unknown values are preserved verbatim.
    pub fn parse(s: &str) -> Self {
        match s {
            "HTTP/1.0" => Self::Http10,
            "HTTP/1.1" => Self::Http11,
            "HTTP/2" | "HTTP/2.0" => Self::Http2,
            "HTTP/3" | "HTTP/3.0" => Self::Http3,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for HttpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HttpProtocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpProtocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Captured request half of a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub http_protocol: HttpProtocol,
    pub uri: String,
    /// Matched route template, filled in by the router when known.
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub headers: Headers,
    pub method: String,
    #[serde(default)]
    pub body: String,
    /// Source IP of the caller.
    #[serde(rename = "ip", default)]
    pub source_ip: String,
}

/// Captured response half of a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub status_code: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Headers,
}

/// One captured request/response cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub version: String,
    /// Creation time in epoch milliseconds.
    pub date_created: i64,
    /// Handler execution time in milliseconds.
    #[serde(default)]
    pub execution_time: f64,
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

impl TelemetryRecord {
    /// Create a record stamped with the current time and crate version.
    pub fn new(request: RequestRecord, response: ResponseRecord) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            date_created: now_millis(),
            execution_time: 0.0,
            request,
            response,
        }
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = elapsed.as_secs_f64() * 1000.0;
        self
    }

    pub fn with_date_created(mut self, epoch_millis: i64) -> Self {
        self.date_created = epoch_millis;
        self
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
