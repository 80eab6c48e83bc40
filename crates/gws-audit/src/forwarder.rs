// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::envelope;
use crate::errors::ProduceError;
use crate::poller::Record;
use crate::producer::Producer;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ForwardStats {
    pub forwarded: u64,
    pub dropped: u64,
}

enum Submission {
    Accepted,
    Dropped,
    Cancelled,
}

/// Single consumer of the record channel. Wraps each record in an envelope and hands it to the
/// producer, one envelope at a time and in channel order.
pub struct ForwardingWorker {
    producer: Arc<dyn Producer + Send + Sync>,
    config: Arc<BrokerConfig>,
    cancel: CancellationToken,
}

impl ForwardingWorker {
    pub fn new(
        producer: Arc<dyn Producer + Send + Sync>,
        config: Arc<BrokerConfig>,
        cancel: CancellationToken,
    ) -> Self {
        ForwardingWorker {
            producer,
            config,
            cancel,
        }
    }

    /// Forwards records until the channel closes or the worker is cancelled, then flushes the
    /// producer. Records already buffered in the channel at cancellation are still submitted.
    pub async fn run(self, mut records: mpsc::Receiver<Record>) -> ForwardStats {
        let mut stats = ForwardStats::default();

        loop {
            let record = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                record = records.recv() => record,
            };
            let Some(record) = record else {
                debug!("Record channel closed");
                break;
            };
            self.forward(&record, &mut stats).await;
        }

        records.close();
        while let Ok(record) = records.try_recv() {
            self.forward(&record, &mut stats).await;
        }

        self.flush().await;
        info!(
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            "Forwarding worker stopped"
        );
        stats
    }

    async fn forward(&self, record: &[u8], stats: &mut ForwardStats) {
        let payload = match envelope::build(record, Utc::now()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Unable to encode envelope");
                stats.dropped += 1;
                return;
            }
        };

        match self.submit(&payload).await {
            Submission::Accepted => stats.forwarded += 1,
            Submission::Dropped => stats.dropped += 1,
            Submission::Cancelled => {
                warn!("Shutdown while the producer queue was full, envelope dropped");
                stats.dropped += 1;
            }
        }
    }

    /// Submits `payload` until it is accepted. A full local queue pauses and resubmits the same
    /// payload; any other error drops it.
    async fn submit(&self, payload: &[u8]) -> Submission {
        loop {
            match self.producer.produce(&self.config.topic, payload) {
                Ok(()) => return Submission::Accepted,
                Err(ProduceError::QueueFull) => {
                    warn!(topic = %self.config.topic, "Local producer queue is full");
                    if !self.pause(self.config.queue_full_backoff).await {
                        return Submission::Cancelled;
                    }
                }
                Err(e) => {
                    error!(topic = %self.config.topic, error = %e, "Failed to produce message");
                    self.pause(self.config.produce_error_backoff).await;
                    return Submission::Dropped;
                }
            }
        }
    }

    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    async fn flush(self) {
        let producer = self.producer;
        let timeout = self.config.flush_timeout;
        match tokio::task::spawn_blocking(move || producer.flush(timeout)).await {
            Ok(Ok(())) => debug!("Producer flushed"),
            Ok(Err(e)) => warn!(error = %e, "Unable to flush producer within {timeout:?}"),
            Err(e) => error!(error = %e, "Flush task failed"),
        }
    }
}
