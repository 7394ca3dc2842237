// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Record sanitization.
//!
//! A [`Sanitizer`] is a pure transform applied exactly once to each record
//! before it is handed to the pipeline. The output type,
//! [`SanitizedRecord`], can only be produced here and exposes no mutable
//! access, so nothing downstream can alter a record after masking.

mod header_mask;

use std::fmt;
use std::sync::Arc;

pub use header_mask::{
    hash_value, mask_headers, sensitive_header_table, HeaderMask, HeaderMaskTable,
    SENSITIVE_HEADERS,
};

use crate::record::TelemetryRecord;

/// Body rewrite callback. Receives the captured body, returns what is reported.
pub type BodyRewrite = Arc<dyn Fn(&str) -> String + Send + Sync>;

fn identity() -> BodyRewrite {
    Arc::new(|body: &str| body.to_string())
}

/// Masking rules for one direction (request or response).
#[derive(Clone)]
pub struct DirectionRules {
    pub headers: HeaderMaskTable,
    /// Report only headers listed in `headers`.
    pub strict: bool,
    pub body: BodyRewrite,
}

impl DirectionRules {
    pub fn new(headers: HeaderMaskTable) -> Self {
        Self { headers, strict: false, body: identity() }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_body_rewrite<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.body = Arc::new(f);
        self
    }
}

impl Default for DirectionRules {
    fn default() -> Self {
        Self::new(HeaderMaskTable::new())
    }
}

impl fmt::Debug for DirectionRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionRules")
            .field("headers", &self.headers)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

/// Sanitizer options for both directions.
#[derive(Debug, Clone, Default)]
pub struct SanitizerOptions {
    pub request: DirectionRules,
    pub response: DirectionRules,
}

impl SanitizerOptions {
    /// Hash the values of common credential headers in both directions.
    pub fn sensitive_defaults() -> Self {
        Self {
            request: DirectionRules::new(sensitive_header_table()),
            response: DirectionRules::new(sensitive_header_table()),
        }
    }
}

/// A record that has passed through a [`Sanitizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedRecord(TelemetryRecord);

impl SanitizedRecord {
    pub fn record(&self) -> &TelemetryRecord {
        &self.0
    }

    pub fn date_created(&self) -> i64 {
        self.0.date_created
    }

    pub fn into_inner(self) -> TelemetryRecord {
        self.0
    }
}

/// Applies header masks and body rewrites to records.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    options: SanitizerOptions,
}

impl Sanitizer {
    pub fn new(options: SanitizerOptions) -> Self {
        Self { options }
    }

    /// Sanitizer that hashes sensitive credential headers.
    pub fn default_sanitizer() -> Self {
        Self::new(SanitizerOptions::sensitive_defaults())
    }

    /// Sanitizer that reports records unchanged.
    pub fn passthrough() -> Self {
        Self::new(SanitizerOptions::default())
    }

    pub fn options(&self) -> &SanitizerOptions {
        &self.options
    }

    /// Sanitize one record. Pure; safe to call concurrently.
    pub fn sanitize(&self, mut record: TelemetryRecord) -> SanitizedRecord {
        let req = &self.options.request;
        let resp = &self.options.response;

        record.request.headers = mask_headers(record.request.headers, &req.headers, req.strict);
        record.response.headers = mask_headers(record.response.headers, &resp.headers, resp.strict);
        record.request.body = (req.body)(&record.request.body);
        record.response.body = (resp.body)(&record.response.body);

        SanitizedRecord(record)
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::default_sanitizer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Headers, RequestRecord, ResponseRecord};

    fn record_with(req_headers: Headers, resp_headers: Headers) -> TelemetryRecord {
        TelemetryRecord::new(
            RequestRecord {
                headers: req_headers,
                method: "POST".into(),
                body: "{\"password\":\"hunter2\"}".into(),
                ..Default::default()
            },
            ResponseRecord { status_code: 201, headers: resp_headers, body: "ok".into() },
        )
    }

    #[test]
    fn default_hashes_credentials_and_keeps_presence() {
        let mut req = Headers::new();
        req.insert("Authorization".into(), vec!["Bearer secret".into()]);
        req.insert("Accept".into(), vec!["*/*".into()]);
        let mut resp = Headers::new();
        resp.insert("Set-Cookie".into(), vec!["sid=1".into()]);

        let out = Sanitizer::default_sanitizer().sanitize(record_with(req, resp));
        let r = out.record();
        assert_eq!(r.request.headers["Authorization"], vec![hash_value("Bearer secret")]);
        assert_eq!(r.request.headers["Accept"], vec!["*/*"]);
        assert_eq!(r.response.headers["Set-Cookie"], vec![hash_value("sid=1")]);
    }

    #[test]
    fn body_rewrites_apply_per_direction() {
        let options = SanitizerOptions {
            request: DirectionRules::default().with_body_rewrite(|_| "[redacted]".to_string()),
            response: DirectionRules::default().with_body_rewrite(|b| b.to_uppercase()),
        };
        let out = Sanitizer::new(options).sanitize(record_with(Headers::new(), Headers::new()));
        assert_eq!(out.record().request.body, "[redacted]");
        assert_eq!(out.record().response.body, "OK");
    }

    #[test]
    fn passthrough_leaves_record_unchanged() {
        let mut req = Headers::new();
        req.insert("Cookie".into(), vec!["a=b".into()]);
        let record = record_with(req, Headers::new());
        let out = Sanitizer::passthrough().sanitize(record.clone());
        assert_eq!(out.into_inner(), record);
    }

    #[test]
    fn strict_response_rules_allow_list() {
        let mut resp = Headers::new();
        resp.insert("Content-Type".into(), vec!["text/plain".into()]);
        resp.insert("X-Internal".into(), vec!["1".into()]);
        let options = SanitizerOptions {
            request: DirectionRules::default(),
            response: DirectionRules::new(
                [("content-type".to_string(), HeaderMask::Preserve)].into(),
            )
            .strict(true),
        };
        let out = Sanitizer::new(options).sanitize(record_with(Headers::new(), resp));
        let headers = &out.record().response.headers;
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("Content-Type"));
    }
}
