// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::producer::{DeliveryReport, DeliveryReportReceiver};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub failed: u64,
    pub client_errors: u64,
}

/// Logs the outcome of every message the producer accepted.
///
/// Runs until the report stream closes, which happens once the producer has been flushed and
/// dropped at shutdown. Reports are never acknowledged back to the forwarder.
///
/// Once `shutdown` is cancelled the stream is only drained: failures are still logged but no
/// longer pause the reporter, so a burst of purged messages cannot hold up shutdown.
pub struct DeliveryReporter {
    reports: DeliveryReportReceiver,
    failure_backoff: Duration,
    shutdown: CancellationToken,
}

impl DeliveryReporter {
    pub fn new(
        reports: DeliveryReportReceiver,
        failure_backoff: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        DeliveryReporter {
            reports,
            failure_backoff,
            shutdown,
        }
    }

    pub async fn run(mut self) -> DeliveryStats {
        let mut stats = DeliveryStats::default();
        while let Some(report) = self.reports.recv().await {
            match report {
                DeliveryReport::Delivered {
                    topic,
                    partition,
                    offset,
                } => {
                    stats.delivered += 1;
                    info!(%topic, partition, offset, "Delivered message to topic");
                }
                DeliveryReport::Failed { topic, reason } => {
                    stats.failed += 1;
                    error!(%topic, error = %reason, "Delivery failed");
                    tokio::select! {
                        () = self.shutdown.cancelled() => {}
                        () = tokio::time::sleep(self.failure_backoff) => {}
                    }
                }
                DeliveryReport::ClientError { reason } => {
                    stats.client_errors += 1;
                    warn!(error = %reason, "Generic client error");
                }
            }
        }
        debug!("Delivery report stream closed");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_reports_are_logged_until_stream_closes() {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = DeliveryReporter::new(rx, Duration::from_secs(1), CancellationToken::new());

        tx.send(DeliveryReport::Delivered {
            topic: "gws-audit".to_string(),
            partition: 3,
            offset: 42,
        })
        .unwrap();
        tx.send(DeliveryReport::Failed {
            topic: "gws-audit".to_string(),
            reason: "Message timed out".to_string(),
        })
        .unwrap();
        tx.send(DeliveryReport::ClientError {
            reason: "all brokers down".to_string(),
        })
        .unwrap();
        drop(tx);

        let stats = reporter.run().await;
        assert_eq!(
            stats,
            DeliveryStats {
                delivered: 1,
                failed: 1,
                client_errors: 1
            }
        );
        assert!(logs_contain("Delivered message to topic"));
        assert!(logs_contain("offset=42"));
        assert!(logs_contain("Delivery failed"));
        assert!(logs_contain("Message timed out"));
        assert!(logs_contain("Generic client error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_pauses_reporter() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(DeliveryReport::Failed {
            topic: "gws-audit".to_string(),
            reason: "Broker transport failure".to_string(),
        })
        .unwrap();
        tx.send(DeliveryReport::Failed {
            topic: "gws-audit".to_string(),
            reason: "Broker transport failure".to_string(),
        })
        .unwrap();
        drop(tx);

        let start = tokio::time::Instant::now();
        let stats = DeliveryReporter::new(rx, Duration::from_secs(1), CancellationToken::new())
            .run()
            .await;
        assert_eq!(stats.failed, 2);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purged_messages_do_not_pause_after_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel();
        for _ in 0..100 {
            tx.send(DeliveryReport::Failed {
                topic: "gws-audit".to_string(),
                reason: "Purged in queue".to_string(),
            })
            .unwrap();
        }
        drop(tx);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let start = tokio::time::Instant::now();
        let stats = DeliveryReporter::new(rx, Duration::from_secs(1), shutdown)
            .run()
            .await;
        assert_eq!(stats.failed, 100);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_failure_pause() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(DeliveryReport::Failed {
            topic: "gws-audit".to_string(),
            reason: "Broker transport failure".to_string(),
        })
        .unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            DeliveryReporter::new(rx, Duration::from_secs(60), shutdown.clone()).run(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();
        drop(tx);
        let stats = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("reporter kept pausing after shutdown")
            .unwrap();
        assert_eq!(stats.failed, 1);
    }
}
