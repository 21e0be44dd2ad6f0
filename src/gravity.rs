//! Gravity timing
//!
//! The interval is re-read on every poll, so a speed change applies from the
//! next period on. Line clears shorten it permanently; the Slow skill swaps in
//! a longer one for a while and then puts back whatever was in effect when the
//! skill fired.

use std::time::{Duration, Instant};

/// Starting gravity interval
pub const INITIAL_INTERVAL: Duration = Duration::from_millis(800);
/// Gravity never gets faster than this
pub const MIN_INTERVAL: Duration = Duration::from_millis(80);

const LINE_CLEAR_FACTOR: f64 = 0.98;
const SLOW_FACTOR: f64 = 0.35;

/// Scale an interval, rounding to whole milliseconds and flooring at the minimum
fn scaled(interval: Duration, factor: f64) -> Duration {
    let ms = (interval.as_millis() as f64 * factor).round() as u64;
    Duration::from_millis(ms).max(MIN_INTERVAL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlowWindow {
    until: Instant,
    restore: Duration,
}

/// Periodic "move down" trigger
#[derive(Debug, Clone)]
pub struct GravityClock {
    baseline: Duration,
    interval: Duration,
    last_fall: Instant,
    slow: Option<SlowWindow>,
}

impl GravityClock {
    pub fn new(baseline: Duration, now: Instant) -> Self {
        let baseline = baseline.max(MIN_INTERVAL);
        Self {
            baseline,
            interval: baseline,
            last_fall: now,
            slow: None,
        }
    }

    /// Current period between forced falls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the active Slow window ends, if one is running
    pub fn slow_until(&self) -> Option<Instant> {
        self.slow.map(|window| window.until)
    }

    /// Returns true when a gravity step is due, and starts the next period
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Some(window) = self.slow {
            if now >= window.until {
                tracing::debug!(restored_ms = window.restore.as_millis() as u64, "slow window ended");
                self.interval = window.restore;
                self.slow = None;
            }
        }

        if now.saturating_duration_since(self.last_fall) >= self.interval {
            self.last_fall = now;
            true
        } else {
            false
        }
    }

    /// Start a fresh period at `now` without firing
    pub fn restart(&mut self, now: Instant) {
        self.last_fall = now;
    }

    /// Permanent speed-up applied after a clear
    pub fn speed_up(&mut self) {
        self.interval = scaled(self.interval, LINE_CLEAR_FACTOR);
    }

    /// Apply a Slow window of `duration`, remembering the interval to restore
    pub fn slow_down(&mut self, now: Instant, duration: Duration) {
        let restore = self.interval;
        self.interval = scaled(self.interval, SLOW_FACTOR);
        self.slow = Some(SlowWindow {
            until: now + duration,
            restore,
        });
    }

    /// Back to the session baseline, with no Slow window pending
    pub fn reset(&mut self, now: Instant) {
        self.interval = self.baseline;
        self.slow = None;
        self.last_fall = now;
    }
}
