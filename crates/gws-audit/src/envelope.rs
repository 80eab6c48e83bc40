// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::value::RawValue;

pub const LOG_SOURCE: &str = "gws-audit-logs-exporter";
pub const LOG_SOURCETYPE: &str = "gws_audit";

const INGEST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Broker-ready wrapper around one serialized activity record.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    /// The record as received, embedded without re-encoding
    pub log_message: &'a RawValue,
    pub log_source: &'static str,
    pub log_sourcetype: &'static str,
    pub log_utc_time_ingest: String,
}

impl<'a> Envelope<'a> {
    pub fn new(payload: &'a RawValue, ingested_at: DateTime<Utc>) -> Self {
        Envelope {
            log_message: payload,
            log_source: LOG_SOURCE,
            log_sourcetype: LOG_SOURCETYPE,
            log_utc_time_ingest: format_ingest_time(ingested_at),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// UTC, microsecond precision, `Z` suffix.
pub fn format_ingest_time(time: DateTime<Utc>) -> String {
    time.format(INGEST_TIME_FORMAT).to_string()
}

/// Wraps `payload` (a JSON document) as of `ingested_at` and serializes the envelope.
pub fn build(payload: &[u8], ingested_at: DateTime<Utc>) -> Result<Vec<u8>, serde_json::Error> {
    let raw: &RawValue = serde_json::from_slice(payload)?;
    Envelope::new(raw, ingested_at).to_bytes()
}
