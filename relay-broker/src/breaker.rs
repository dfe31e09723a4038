//! Circuit breaker for the message store.
//!
//! A store hiccup is connection-scoped, but a systemic outage should stop
//! hammering the backend. After a run of consecutive failures the breaker
//! opens for a cooldown window and store calls short-circuit to
//! [`StoreError::Unavailable`].

use crate::config::LimitsConfig;
use crate::error::StoreError;
use crate::time::micros_now;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Consecutive-failure circuit breaker.
///
/// Lock-free: a failure counter plus an open-until deadline in epoch
/// microseconds, both atomics.
#[derive(Debug)]
pub struct StoreBreaker {
    failure_threshold: u32,
    cooldown_micros: u64,
    consecutive_failures: AtomicU32,
    open_until_micros: AtomicU64,
}

impl StoreBreaker {
    /// Create a breaker from configuration.
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            failure_threshold: config.breaker_failure_threshold,
            cooldown_micros: config.breaker_cooldown_secs.saturating_mul(1_000_000),
            consecutive_failures: AtomicU32::new(0),
            open_until_micros: AtomicU64::new(0),
        }
    }

    /// Check whether store calls are currently allowed.
    pub fn check(&self) -> Result<(), StoreError> {
        let open_until = self.open_until_micros.load(Ordering::Acquire);
        if micros_now() < open_until {
            return Err(StoreError::Unavailable("circuit breaker open".into()));
        }
        Ok(())
    }

    /// Record a successful store call, closing the breaker.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.open_until_micros.store(0, Ordering::Release);
    }

    /// Record a failed store call; opens the breaker at the threshold.
    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.failure_threshold {
            let deadline = micros_now().saturating_add(self.cooldown_micros);
            self.open_until_micros.store(deadline, Ordering::Release);
            tracing::warn!(
                failures,
                cooldown_secs = self.cooldown_micros / 1_000_000,
                "store circuit breaker opened"
            );
        }
    }
}
