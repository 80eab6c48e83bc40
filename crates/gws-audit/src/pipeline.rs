// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline orchestration.
//!
//! [`Pipeline::start`] spawns one [`SourcePoller`] per configured source, a single
//! [`ForwardingWorker`] draining the shared record channel, and the [`DeliveryReporter`].
//! The returned [`PipelineHandle`] owns the tasks and the cancellation token.
//!
//! Shutdown runs in dependency order: the token is cancelled, pollers stop at their next
//! suspension point, the forwarder submits what is already buffered and flushes the producer,
//! and dropping the producer closes the report stream, which ends the reporter.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BrokerConfig, PollConfig};
use crate::delivery::{DeliveryReporter, DeliveryStats};
use crate::errors::PipelineError;
use crate::feed::AuditFeed;
use crate::forwarder::{ForwardStats, ForwardingWorker};
use crate::poller::{Clock, SourcePoller};
use crate::producer::{DeliveryReportReceiver, Producer};

/// Reasons for pipeline shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Shutdown requested through the cancellation token
    GracefulShutdown,
    /// SIGINT (Ctrl+C)
    UserInterrupt,
    /// SIGTERM
    Terminated,
    /// Signal handlers could not be installed
    FatalError,
}

/// Final counters of a stopped pipeline. Missing when the task had to be aborted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub forward: Option<ForwardStats>,
    pub delivery: Option<DeliveryStats>,
}

pub struct Pipeline {
    pub poll_config: Arc<PollConfig>,
    pub broker_config: Arc<BrokerConfig>,
    pub feed: Arc<dyn AuditFeed + Send + Sync>,
    pub producer: Arc<dyn Producer + Send + Sync>,
    pub clock: Option<Clock>,
}

impl Pipeline {
    pub fn new(
        poll_config: Arc<PollConfig>,
        broker_config: Arc<BrokerConfig>,
        feed: Arc<dyn AuditFeed + Send + Sync>,
        producer: Arc<dyn Producer + Send + Sync>,
    ) -> Self {
        Pipeline {
            poll_config,
            broker_config,
            feed,
            producer,
            clock: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Spawns all workers on the current runtime.
    ///
    /// `reports` must be the delivery report stream belonging to `producer`.
    pub fn start(self, reports: DeliveryReportReceiver) -> Result<PipelineHandle, PipelineError> {
        if self.poll_config.sources.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let cancel = CancellationToken::new();
        let (records_tx, records_rx) = mpsc::channel(self.poll_config.channel_capacity.max(1));

        let reporter = DeliveryReporter::new(
            reports,
            self.broker_config.delivery_error_backoff,
            cancel.clone(),
        );
        let reporter_task = tokio::spawn(reporter.run());

        let forwarder = ForwardingWorker::new(
            self.producer,
            Arc::clone(&self.broker_config),
            cancel.clone(),
        );
        let forwarder_task = tokio::spawn(forwarder.run(records_rx));

        let mut poller_tasks = Vec::with_capacity(self.poll_config.sources.len());
        for source in &self.poll_config.sources {
            let mut poller = SourcePoller::new(
                source,
                Arc::clone(&self.feed),
                Arc::clone(&self.poll_config),
                records_tx.clone(),
                cancel.clone(),
            );
            if let Some(clock) = &self.clock {
                poller = poller.with_clock(Arc::clone(clock));
            }
            poller_tasks.push(tokio::spawn(poller.run()));
        }

        info!(
            sources = poller_tasks.len(),
            topic = %self.broker_config.topic,
            "Pipeline started"
        );

        Ok(PipelineHandle {
            cancel,
            pollers: poller_tasks,
            forwarder: Some(forwarder_task),
            reporter: Some(reporter_task),
        })
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    cancel: CancellationToken,
    pollers: Vec<JoinHandle<()>>,
    forwarder: Option<JoinHandle<ForwardStats>>,
    reporter: Option<JoinHandle<DeliveryStats>>,
}

impl PipelineHandle {
    /// Token observed by every worker. Cancelling it stops the pipeline.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for SIGINT, SIGTERM or cancellation of the pipeline token.
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        tokio::select! {
            () = self.cancel.cancelled() => {
                info!("Shutdown requested via cancellation token");
                ShutdownReason::GracefulShutdown
            }
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        info!("Received Ctrl+C, initiating shutdown");
                        ShutdownReason::UserInterrupt
                    }
                    Err(e) => {
                        error!("Failed to listen for Ctrl+C: {}", e);
                        ShutdownReason::FatalError
                    }
                }
            }
            reason = terminate() => reason,
        }
    }

    /// Cancels every worker and waits up to `timeout` for them to finish. Tasks still running
    /// at the deadline are aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> Result<PipelineStats, PipelineError> {
        info!("Initiating graceful shutdown");
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut timed_out = false;
        let mut stats = PipelineStats::default();

        for (idx, handle) in std::mem::take(&mut self.pollers).into_iter().enumerate() {
            if join_before(handle, deadline, "poller", idx).await.is_none() {
                timed_out = true;
            }
        }
        if let Some(handle) = self.forwarder.take() {
            stats.forward = join_before(handle, deadline, "forwarder", 0).await;
            timed_out |= stats.forward.is_none();
        }
        if let Some(handle) = self.reporter.take() {
            stats.delivery = join_before(handle, deadline, "delivery reporter", 0).await;
            timed_out |= stats.delivery.is_none();
        }

        if timed_out {
            return Err(PipelineError::ShutdownTimeout(timeout));
        }
        info!("Pipeline shutdown complete");
        Ok(stats)
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        for handle in &self.pollers {
            handle.abort();
        }
        if let Some(handle) = &self.forwarder {
            handle.abort();
        }
        if let Some(handle) = &self.reporter {
            handle.abort();
        }
    }
}

async fn join_before<T>(
    mut handle: JoinHandle<T>,
    deadline: tokio::time::Instant,
    task: &str,
    idx: usize,
) -> Option<T> {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(Ok(value)) => {
            debug!("Task {task} {idx} completed");
            Some(value)
        }
        Ok(Err(e)) => {
            error!("Task {task} {idx} failed: {e}");
            None
        }
        Err(_) => {
            warn!("Task {task} {idx} timed out, aborting");
            handle.abort();
            None
        }
    }
}

#[cfg(unix)]
async fn terminate() -> ShutdownReason {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
            info!("Received SIGTERM, initiating shutdown");
            ShutdownReason::Terminated
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM: {}", e);
            ShutdownReason::FatalError
        }
    }
}

#[cfg(not(unix))]
async fn terminate() -> ShutdownReason {
    std::future::pending().await
}
