// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use chrono::{DateTime, TimeZone, Utc};
use gws_audit::{
    activity::Activity,
    backoff::RetryStrategy,
    config::{BrokerConfig, PollConfig},
    poller::Clock,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::mocks::ProducerLog;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
}

/// Wall clock driven by tokio's clock, so paused tests see time move.
#[allow(dead_code)]
pub fn tokio_clock() -> Clock {
    let origin = tokio::time::Instant::now();
    Arc::new(move || t0() + chrono::Duration::from_std(origin.elapsed()).unwrap())
}

pub fn activity(source: &str, n: u64) -> Activity {
    serde_json::from_value(json!({
        "kind": "admin#reports#activity",
        "id": {
            "time": "2024-03-05T11:54:30.123456789Z",
            "applicationName": source,
            "uniqueQualifier": format!("{source}-{n}")
        },
        "events": [{ "name": "event" }]
    }))
    .unwrap()
}

pub fn poll_config(sources: &[&str], api_url: &str) -> Arc<PollConfig> {
    Arc::new(PollConfig {
        credentials_file: "keyfile.json".into(),
        subject: "admin@example.com".to_string(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        period: Duration::from_secs(60),
        api_url: api_url.to_string(),
        user_key: "all".to_string(),
        retry_strategy: RetryStrategy::ExponentialBackoff {
            max_attempts: 3,
            base_ms: 100,
            max_ms: 1000,
        },
        channel_capacity: 1,
        request_timeout: Duration::from_secs(5),
        proxy_url: None,
    })
}

pub fn broker_config() -> Arc<BrokerConfig> {
    Arc::new(BrokerConfig {
        servers: "localhost:9092".to_string(),
        topic: "gws-audit".to_string(),
        security_protocol: "PLAINTEXT".to_string(),
        ssl_ca_location: String::new(),
        ssl_certificate_location: String::new(),
        ssl_key_location: String::new(),
        queue_max_messages: 10,
        queue_full_backoff: Duration::from_secs(5),
        produce_error_backoff: Duration::from_secs(1),
        delivery_error_backoff: Duration::from_secs(1),
        flush_timeout: Duration::from_secs(1),
    })
}

/// Waits until the producer saw `count` accepted envelopes.
pub async fn wait_for_accepted(sent: &ProducerLog, count: usize, limit: Duration) {
    tokio::time::timeout(limit, async {
        while sent.accepted().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {count} envelopes, got {}",
            sent.accepted().len()
        )
    });
}

/// `uniqueQualifier` of each envelope's embedded record, in submission order.
pub fn qualifiers(envelopes: &[serde_json::Value]) -> Vec<String> {
    envelopes
        .iter()
        .map(|e| {
            e["log_message"]["id"]["uniqueQualifier"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect()
}
