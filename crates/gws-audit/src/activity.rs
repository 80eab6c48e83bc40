// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reports API activity records.
//!
//! Only `id.time` is interpreted. Every other field is carried through untouched so the
//! forwarded payload matches what the feed returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityId {
    /// RFC3339 timestamp with up to nanosecond precision. Kept as raw JSON so a record with a
    /// null or non-string time still decodes and is rejected on its own by [`Activity::time`].
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub time: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default)]
    pub id: ActivityId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Activity {
    /// Parsed `id.time`. A missing or non-string time fails like an empty string.
    pub fn time(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        let raw = self.id.time.as_str().unwrap_or_default();
        DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// One page of `activities.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPage {
    #[serde(default)]
    pub items: Vec<Activity>,
    pub next_page_token: Option<String>,
}
