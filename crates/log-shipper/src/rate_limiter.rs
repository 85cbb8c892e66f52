// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use tokio::time::Instant;

/// Enforces a minimum interval between the starts of consecutive attempts.
///
/// Only attempts that actually send something are recorded, so an empty buffer
/// never consumes the window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    previous_attempt: Option<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            previous_attempt: None,
        }
    }

    /// True if no attempt was ever recorded, or strictly more than the minimum
    /// interval has elapsed since the last one.
    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.previous_attempt {
            None => true,
            Some(previous) => now.saturating_duration_since(previous) > self.min_interval,
        }
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.previous_attempt = Some(now);
    }

    #[must_use]
    pub fn previous_attempt(&self) -> Option<Instant> {
        self.previous_attempt
    }

    /// Time left before the next attempt may start. Zero exactly when
    /// [`RateLimiter::is_ready`] holds.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.previous_attempt {
            Some(previous) if !self.is_ready(now) => {
                // First ready instant is one tick past the boundary.
                (previous + self.min_interval + Duration::from_nanos(1))
                    .saturating_duration_since(now)
            }
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_before_first_attempt() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert!(limiter.is_ready(Instant::now()));
        assert_eq!(limiter.previous_attempt(), None);
    }

    #[test]
    fn test_interval_is_exclusive() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.record_attempt(start);

        assert!(!limiter.is_ready(start));
        assert!(!limiter.is_ready(start + Duration::from_millis(999)));
        assert!(!limiter.is_ready(start + Duration::from_secs(1)));
        assert!(limiter.is_ready(start + Duration::from_millis(1001)));
    }

    #[test]
    fn test_zero_interval() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        limiter.record_attempt(start);
        assert!(!limiter.is_ready(start));
        assert!(limiter.is_ready(start + Duration::from_nanos(1)));
    }

    #[test]
    fn test_remaining() {
        let mut limiter = RateLimiter::new(Duration::from_secs(2));
        let start = Instant::now();
        assert_eq!(limiter.remaining(start), Duration::ZERO);
        limiter.record_attempt(start);
        assert_eq!(
            limiter.remaining(start + Duration::from_millis(500)),
            Duration::from_millis(1500) + Duration::from_nanos(1)
        );
        assert_eq!(limiter.remaining(start + Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn test_remaining_at_boundary() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.record_attempt(start);

        let boundary = start + Duration::from_secs(1);
        assert!(!limiter.is_ready(boundary));
        let wait = limiter.remaining(boundary);
        assert!(wait > Duration::ZERO);
        assert!(limiter.is_ready(boundary + wait));
        assert_eq!(limiter.remaining(boundary + wait), Duration::ZERO);
    }
}
