// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock feed and broker implementations for testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gws_audit::{
    activity::Activity,
    errors::{FeedError, ProduceError},
    feed::AuditFeed,
    producer::{DeliveryReport, DeliveryReportReceiver, DeliveryReportSender, Producer},
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Feed that serves scripted pages per source, then empty windows.
#[derive(Default)]
pub struct MockFeed {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<Activity>, FeedError>>>>,
    calls: Mutex<Vec<(String, DateTime<Utc>, DateTime<Utc>)>>,
}

impl MockFeed {
    pub fn respond(&self, source: &str, response: Result<Vec<Activity>, FeedError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(source.to_string())
            .or_default()
            .push_back(response);
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<(String, DateTime<Utc>, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditFeed for MockFeed {
    async fn query(
        &self,
        source: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Activity>, FeedError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_string(), start, end));
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(source)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// What a [`MockProducer`] saw, readable after the producer itself was handed to the pipeline.
#[derive(Clone, Default)]
pub struct ProducerLog {
    attempts: Arc<Mutex<usize>>,
    accepted: Arc<Mutex<Vec<serde_json::Value>>>,
    flushed: Arc<Mutex<bool>>,
}

impl ProducerLog {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    pub fn accepted(&self) -> Vec<serde_json::Value> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn flushed(&self) -> bool {
        *self.flushed.lock().unwrap()
    }
}

/// Broker that accepts everything not scripted otherwise and reports each accepted message as
/// delivered to partition 0, like the client's delivery callback would.
pub struct MockProducer {
    script: Mutex<VecDeque<Result<(), ProduceError>>>,
    reports: DeliveryReportSender,
    sent: ProducerLog,
}

impl MockProducer {
    pub fn new(
        script: Vec<Result<(), ProduceError>>,
    ) -> (Arc<MockProducer>, ProducerLog, DeliveryReportReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = ProducerLog::default();
        let producer = MockProducer {
            script: Mutex::new(script.into()),
            reports: tx,
            sent: sent.clone(),
        };
        (Arc::new(producer), sent, rx)
    }
}

impl Producer for MockProducer {
    fn produce(&self, topic: &str, payload: &[u8]) -> Result<(), ProduceError> {
        *self.sent.attempts.lock().unwrap() += 1;
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if outcome.is_ok() {
            let mut accepted = self.sent.accepted.lock().unwrap();
            accepted.push(serde_json::from_slice(payload).unwrap());
            let _ = self.reports.send(DeliveryReport::Delivered {
                topic: topic.to_string(),
                partition: 0,
                offset: accepted.len() as i64 - 1,
            });
        }
        outcome
    }

    fn flush(&self, _timeout: Duration) -> Result<(), ProduceError> {
        *self.sent.flushed.lock().unwrap() = true;
        Ok(())
    }
}
