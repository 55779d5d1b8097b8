//! Request pacing
//!
//! This module handles:
//! - The jittered delay slept before every outbound request
//! - Linear rate-limit backoff
//! - The flat delay between transport retries

use crate::config::{IntervalConfig, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Lower and upper jitter factors applied to the base interval
const JITTER: (f64, f64) = (0.8, 1.2);

/// Computes and sleeps the delays the crawl engine needs
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    backoff_unit: Duration,
    transport_retry_delay: Duration,
}

impl Pacer {
    pub fn new(interval: &IntervalConfig, retry: &RetryConfig) -> Self {
        Self {
            interval: Duration::from_secs_f64(interval.seconds.max(0.0)),
            backoff_unit: Duration::from_millis(retry.backoff_unit_ms),
            transport_retry_delay: Duration::from_millis(retry.transport_retry_delay_ms),
        }
    }

    /// The base interval scaled by a uniform factor in [0.8, 1.2]
    pub fn jittered_interval(&self) -> Duration {
        if self.interval.is_zero() {
            return Duration::ZERO;
        }
        let factor = rand::thread_rng().gen_range(JITTER.0..=JITTER.1);
        self.interval.mul_f64(factor)
    }

    /// Backoff after a rate-limit response
    ///
    /// `next_retry` is the retry count the re-queued task will carry, so the
    /// first throttle waits two units, the second four, and so on.
    pub fn rate_limit_backoff(&self, next_retry: u32) -> Duration {
        self.backoff_unit * next_retry.saturating_mul(2)
    }

    pub fn transport_retry_delay(&self) -> Duration {
        self.transport_retry_delay
    }

    /// Sleeps one jittered interval
    pub async fn pause(&self) {
        sleep(self.jittered_interval()).await;
    }
}

/// Sleeps unless the duration is zero
pub async fn sleep(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
