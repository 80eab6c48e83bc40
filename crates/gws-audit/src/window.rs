// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Rolling `[start, end)` interval queried by one poller.
///
/// `end` trails the wall clock by `lag` so late-arriving upstream events are still inside the
/// window when it is queried. `start` only moves on [`PollWindow::advance`], which makes the
/// previous end the next start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollWindow {
    start: DateTime<Utc>,
    lag: chrono::Duration,
}

impl PollWindow {
    pub fn new(now: DateTime<Utc>, lookback: Duration, lag: Duration) -> Self {
        PollWindow {
            start: now - to_chrono(lookback),
            lag: to_chrono(lag),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the window for a query issued at `now`.
    pub fn end_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.lag
    }

    /// Moves the window forward. Ends at or before the current start are ignored so the window
    /// never runs backwards when the clock steps back.
    pub fn advance(&mut self, end: DateTime<Utc>) {
        if end > self.start {
            self.start = end;
        }
    }
}

/// RFC3339 with nanoseconds and a `Z` suffix, as the Reports API expects.
pub fn format_rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_initial_window_lags_by_offsets() {
        let period = Duration::from_secs(60);
        let window = PollWindow::new(t0(), period * 6, period * 5);
        assert_eq!(window.start(), t0() - chrono::Duration::seconds(360));
        assert_eq!(window.end_at(t0()), t0() - chrono::Duration::seconds(300));
        assert!(window.start() < window.end_at(t0()));
    }

    #[test]
    fn test_advance_chains_windows() {
        let period = Duration::from_secs(60);
        let mut window = PollWindow::new(t0(), period * 6, period * 5);
        let mut previous_end = None;
        for k in 0..5 {
            let now = t0() + chrono::Duration::seconds(60 * k);
            let end = window.end_at(now);
            if let Some(previous_end) = previous_end {
                assert_eq!(window.start(), previous_end);
                assert!(end > previous_end);
            }
            window.advance(end);
            previous_end = Some(end);
        }
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let mut window = PollWindow::new(t0(), Duration::from_secs(60), Duration::ZERO);
        let start = window.start();
        window.advance(start - chrono::Duration::seconds(1));
        assert_eq!(window.start(), start);
        window.advance(start);
        assert_eq!(window.start(), start);
    }

    #[test]
    fn test_format_rfc3339_nanos() {
        let t = t0() + chrono::Duration::nanoseconds(5);
        assert_eq!(format_rfc3339(t), "2024-03-05T12:00:00.000000005Z");
        assert_eq!(format_rfc3339(t0()), "2024-03-05T12:00:00.000000000Z");
    }
}
