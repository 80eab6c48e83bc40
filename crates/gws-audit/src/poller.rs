// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::activity::Activity;
use crate::backoff::Backoff;
use crate::config::PollConfig;
use crate::feed::AuditFeed;
use crate::window::{format_rfc3339, PollWindow};

/// Serialized activity record travelling from pollers to the forwarder.
pub type Record = Vec<u8>;
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Repeatedly queries one source of the audit feed over consecutive windows and pushes each
/// valid record onto the shared channel.
pub struct SourcePoller {
    source: String,
    feed: Arc<dyn AuditFeed + Send + Sync>,
    config: Arc<PollConfig>,
    records: mpsc::Sender<Record>,
    cancel: CancellationToken,
    clock: Clock,
}

impl SourcePoller {
    pub fn new(
        source: &str,
        feed: Arc<dyn AuditFeed + Send + Sync>,
        config: Arc<PollConfig>,
        records: mpsc::Sender<Record>,
        cancel: CancellationToken,
    ) -> Self {
        SourcePoller {
            source: source.to_string(),
            feed,
            config,
            records,
            cancel,
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Runs until cancelled or until the record channel closes.
    pub async fn run(self) {
        let mut window = PollWindow::new(
            (self.clock)(),
            self.config.initial_lookback(),
            self.config.window_lag(),
        );
        let mut backoff = Backoff::new(self.config.retry_strategy);
        info!(source = %self.source, start = %format_rfc3339(window.start()), "Starting poller");

        loop {
            let end = window.end_at((self.clock)());
            if end <= window.start() {
                debug!(source = %self.source, "Window is empty, waiting for the next period");
                if !self.pause(self.config.period).await {
                    break;
                }
                continue;
            }

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.feed.query(&self.source, window.start(), end) => result,
            };

            let activities = match result {
                Ok(activities) => {
                    backoff.reset();
                    activities
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        source = %self.source,
                        start = %format_rfc3339(window.start()),
                        end = %format_rfc3339(end),
                        attempt = backoff.attempt(),
                        error = %e,
                        "Unable to retrieve activities, retrying in {delay:?}"
                    );
                    if backoff.is_exhausted() {
                        error!(
                            source = %self.source,
                            start = %format_rfc3339(window.start()),
                            "Feed still failing after {} consecutive attempts",
                            backoff.attempt()
                        );
                        backoff.reset();
                    }
                    if !self.pause(delay).await {
                        break;
                    }
                    continue;
                }
            };

            if !self.emit(activities).await {
                break;
            }
            if !self.pause(self.config.period).await {
                break;
            }
            window.advance(end);
        }

        debug!(source = %self.source, "Poller stopped");
    }

    /// Sends every valid activity in feed order. Returns false when the poller must stop.
    async fn emit(&self, activities: Vec<Activity>) -> bool {
        for activity in activities {
            if let Err(e) = activity.time() {
                warn!(
                    source = %self.source,
                    timestamp = %activity.id.time,
                    error = %e,
                    "Unable to parse timestamp"
                );
                continue;
            }

            let record = match activity.to_bytes() {
                Ok(record) => record,
                Err(e) => {
                    warn!(source = %self.source, error = %e, "Unable to encode activity to JSON");
                    continue;
                }
            };

            let sent = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return false,
                sent = self.records.send(record) => sent,
            };
            if sent.is_err() {
                debug!(source = %self.source, "Record channel closed");
                return false;
            }
        }
        true
    }

    /// Sleeps for `duration`. Returns false if cancelled first.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            tokio::task::yield_now().await;
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}
