//! Request pacing for the SIS API
//!
//! The API is called sequentially with a fixed minimum gap between
//! requests. The arithmetic is kept in pure functions so it can be tested
//! without sleeping.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Minimum gap between requests for a requests-per-minute budget.
///
/// A rate of zero disables pacing.
pub fn interval_for_rate(requests_per_minute: u32) -> Duration {
    if requests_per_minute == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(60) / requests_per_minute
}

/// How long to wait before the next request may be sent.
///
/// # Arguments
/// * `last` - When the previous request was sent (None if never)
/// * `now` - Current instant
/// * `interval` - Minimum gap between requests
pub fn remaining_wait(last: Option<Instant>, now: Instant, interval: Duration) -> Duration {
    match last {
        Some(last) => interval.saturating_sub(now.saturating_duration_since(last)),
        None => Duration::ZERO,
    }
}

/// Blocking throttle enforcing a fixed minimum interval between calls
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Cell<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Cell::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep until the next request is allowed, then mark it as sent
    pub fn wait(&self) {
        let delay = remaining_wait(self.last.get(), Instant::now(), self.interval);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.last.set(Some(Instant::now()));
    }
}
