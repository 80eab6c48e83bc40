// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use tokio::sync::mpsc;

use crate::errors::ProduceError;

/// Outcome of a message after the broker client accepted it, or a client-level problem
/// not tied to any single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    Delivered {
        topic: String,
        partition: i32,
        offset: i64,
    },
    Failed {
        topic: String,
        reason: String,
    },
    ClientError {
        reason: String,
    },
}

pub type DeliveryReportSender = mpsc::UnboundedSender<DeliveryReport>;
pub type DeliveryReportReceiver = mpsc::UnboundedReceiver<DeliveryReport>;

/// Asynchronous broker submission.
///
/// `produce` only enqueues into the client's local buffer and returns right away; the final
/// outcome of each message arrives later on the client's [`DeliveryReport`] stream. The report
/// stream closes once the producer is dropped.
pub trait Producer {
    fn produce(&self, topic: &str, payload: &[u8]) -> Result<(), ProduceError>;

    /// Blocks until in-flight messages are delivered or `timeout` elapses.
    fn flush(&self, timeout: Duration) -> Result<(), ProduceError>;
}
