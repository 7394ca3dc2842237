// Copyright 2024-2026 Gateway Telemetry Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-header masking policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record::Headers;

/// What to do with a header before it leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMask {
    /// Report the header unchanged.
    Preserve,
    /// Keep the header name, report no values.
    RemoveValues,
    /// Replace each value with its SHA-256 hex digest.
    HashValues,
    /// Drop the header entirely.
    Remove,
}

impl HeaderMask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::RemoveValues => "remove_values",
            Self::HashValues => "hash_values",
            Self::Remove => "remove",
        }
    }
}

/// Lower-cased header name to mask.
pub type HeaderMaskTable = HashMap<String, HeaderMask>;

/// Header names whose values are hashed by the default sanitizer.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "set-cookie",
    "cookie",
    "authorization",
    "x-api-key",
    "token",
    "api-token",
    "api-key",
];

/// Mask table hashing every name in [`SENSITIVE_HEADERS`].
pub fn sensitive_header_table() -> HeaderMaskTable {
    SENSITIVE_HEADERS
        .iter()
        .map(|name| (name.to_string(), HeaderMask::HashValues))
        .collect()
}

/// Hex-encoded SHA-256 of a header value.
pub fn hash_value(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Apply `table` to `headers`.
///
/// Lookup is by lower-cased name; the original casing is kept in the
/// output. In strict mode headers absent from the table are dropped.
pub fn mask_headers(headers: Headers, table: &HeaderMaskTable, strict: bool) -> Headers {
    let mut masked = Headers::new();

    for (name, values) in headers {
        let mask = match table.get(&name.to_ascii_lowercase()) {
            Some(mask) => *mask,
            None if strict => continue,
            None => HeaderMask::Preserve,
        };

        match mask {
            HeaderMask::Preserve => {
                masked.insert(name, values);
            }
            HeaderMask::RemoveValues => {
                masked.insert(name, Vec::new());
            }
            HeaderMask::HashValues => {
                let hashed = values.iter().map(|v| hash_value(v)).collect();
                masked.insert(name, hashed);
            }
            HeaderMask::Remove => {}
        }
    }

    masked
}
