// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window cap on job starts across the whole worker pool.

use std::time::Duration;

use tokio::time::Instant;

/// Permits at most `max_starts` job starts per `window`.
///
/// Independent of the concurrency cap: short jobs can free their slots long
/// before the window rolls over, and the throttle still holds them back.
#[derive(Debug)]
pub struct StartThrottle {
    max_starts: u32,
    window: Duration,
    window_start: Instant,
    started: u32,
}

impl StartThrottle {
    pub fn new(max_starts: u32, window: Duration) -> Self {
        Self {
            max_starts: max_starts.max(1),
            window,
            window_start: Instant::now(),
            started: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.started = 0;
        }
    }

    /// Waits until a start is permitted in the current window.
    ///
    /// Does not consume the slot; call [`StartThrottle::record`] once a job
    /// actually starts.
    pub async fn ready(&mut self) {
        loop {
            let now = Instant::now();
            self.roll(now);
            if self.started < self.max_starts {
                return;
            }
            tokio::time::sleep_until(self.window_start + self.window).await;
        }
    }

    /// Counts one job start against the current window.
    pub fn record(&mut self) {
        self.roll(Instant::now());
        self.started += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn holds_back_starts_beyond_the_window_budget() {
        let origin = Instant::now();
        let mut throttle = StartThrottle::new(10, Duration::from_secs(1));

        let mut offsets = Vec::new();
        for _ in 0..25 {
            throttle.ready().await;
            throttle.record();
            offsets.push(origin.elapsed());
        }

        assert!(offsets[..10].iter().all(|d| *d < Duration::from_secs(1)));
        assert!(offsets[10..20]
            .iter()
            .all(|d| *d >= Duration::from_secs(1) && *d < Duration::from_secs(2)));
        assert!(offsets[20..].iter().all(|d| *d >= Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_without_record_consumes_nothing() {
        let origin = Instant::now();
        let mut throttle = StartThrottle::new(1, Duration::from_secs(1));

        for _ in 0..5 {
            throttle.ready().await;
        }
        assert_eq!(origin.elapsed(), Duration::ZERO);

        throttle.record();
        throttle.ready().await;
        assert!(origin.elapsed() >= Duration::from_secs(1));
    }
}
