//! # Circuit Breaker Module
//!
//! Guards calls to the food analysis service. After repeated failures the
//! breaker opens and photo analysis fails fast with a friendly notice instead
//! of making every user wait for the full request timeout.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::RecoveryConfig;

/// Observable state of the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, requests pass through
    Closed,
    /// Failure threshold exceeded, requests fail fast
    Open,
    /// Reset timeout elapsed, the next request probes the service
    HalfOpen,
}

#[derive(Debug, Default)]
struct Counters {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Circuit breaker for analysis requests
///
/// Uses `RecoveryConfig` for:
/// - `circuit_breaker_threshold`: consecutive failures before opening
/// - `circuit_breaker_reset_secs`: time before a probe request is allowed
#[derive(Debug)]
pub struct CircuitBreaker {
    counters: Mutex<Counters>,
    threshold: u32,
    reset_after: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            threshold: config.circuit_breaker_threshold.max(1),
            reset_after: Duration::from_secs(config.circuit_breaker_reset_secs),
        }
    }

    // A poisoned lock only means another task panicked mid-update of two integers.
    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> BreakerState {
        let counters = self.counters();
        match counters.opened_at {
            Some(opened_at) if opened_at.elapsed() < self.reset_after => BreakerState::Open,
            Some(_) => BreakerState::HalfOpen,
            None => BreakerState::Closed,
        }
    }

    /// Whether requests should currently be refused
    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    pub fn record_failure(&self) {
        let mut counters = self.counters();
        counters.consecutive_failures = counters.consecutive_failures.saturating_add(1);
        if counters.consecutive_failures >= self.threshold {
            counters.opened_at = Some(Instant::now());
        }
    }

    pub fn record_success(&self) {
        *self.counters() = Counters::default();
    }
}
