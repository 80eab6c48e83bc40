// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retry pacing for failed feed queries.
//!
//! A poller never gives up on its window: once `max_attempts` consecutive failures
//! accumulate the caller is told to escalate, the counter starts over and retries go on.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Retry without waiting. Escalates every `n` consecutive failures.
    Immediate(u32),
    /// Exponential backoff with jitter: `base_ms * 2^(attempt - 1)`, capped at `max_ms`,
    /// with the upper half of the delay randomized.
    ExponentialBackoff {
        max_attempts: u32,
        base_ms: u64,
        max_ms: u64,
    },
}

impl RetryStrategy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryStrategy::Immediate(n) => *n,
            RetryStrategy::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }

    /// Upper bound of the delay before retry number `attempt` (1-based).
    pub fn ceiling(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::ExponentialBackoff {
                base_ms, max_ms, ..
            } => {
                let shift = attempt.saturating_sub(1).min(32);
                let ms = base_ms.saturating_mul(1u64 << shift).min(*max_ms);
                Duration::from_millis(ms)
            }
        }
    }

    /// Delay before retry number `attempt`, in `[ceiling / 2, ceiling]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let half = ceiling / 2;
        Duration::from_millis(half + fastrand::u64(0..=ceiling - half))
    }
}

/// Consecutive-failure counter driven by a [`RetryStrategy`].
#[derive(Debug)]
pub struct Backoff {
    strategy: RetryStrategy,
    attempt: u32,
}

impl Backoff {
    pub fn new(strategy: RetryStrategy) -> Self {
        Backoff {
            strategy,
            attempt: 0,
        }
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.strategy.delay(self.attempt)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// True once the failure count reached the strategy's attempt budget.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.strategy.max_attempts()
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
