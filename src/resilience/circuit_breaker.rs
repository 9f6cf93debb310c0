//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, outcomes fill a count-based sliding window
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: a fixed number of trial calls decide the next state
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure rate or slow-call rate >= threshold over a full window
//! Open → Half-Open: first permit request after the open wait elapses
//! Half-Open → Closed: all trial outcomes in, both rates below threshold
//! Half-Open → Open: all trial outcomes in, either rate at or above threshold
//! ```
//!
//! # Design Decisions
//! - One lock around all state; every permit decision and every recorded
//!   outcome is a single critical section
//! - Permits carry the state generation they were issued under; outcomes
//!   from an older generation are dropped
//! - A trial permit dropped without an outcome is handed back

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::{ProxyError, Result};
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

/// Result of one guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub failed: bool,
    pub slow: bool,
}

/// Last-N outcomes with running counts.
#[derive(Debug)]
struct Window {
    capacity: usize,
    outcomes: VecDeque<Outcome>,
    failures: usize,
    slow: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            outcomes: VecDeque::with_capacity(capacity),
            failures: 0,
            slow: 0,
        }
    }

    fn push(&mut self, outcome: Outcome) {
        if self.outcomes.len() == self.capacity {
            if let Some(evicted) = self.outcomes.pop_front() {
                self.failures -= evicted.failed as usize;
                self.slow -= evicted.slow as usize;
            }
        }
        self.failures += outcome.failed as usize;
        self.slow += outcome.slow as usize;
        self.outcomes.push_back(outcome);
    }

    fn is_full(&self) -> bool {
        self.outcomes.len() >= self.capacity
    }

    fn failure_rate(&self) -> f64 {
        percent(self.failures, self.outcomes.len())
    }

    fn slow_rate(&self) -> f64 {
        percent(self.slow, self.outcomes.len())
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    window: Window,
    opened_at: Option<Instant>,
    half_open_issued: usize,
    epoch: u64,
}

/// Named, process-wide circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// Permission to make one call.
///
/// Consumed by [`CallPermit::record`]. Dropping it unrecorded returns a
/// half-open trial slot.
#[derive(Debug)]
#[must_use = "a permit must be recorded or dropped"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    epoch: u64,
    started: Instant,
    recorded: bool,
}

impl CallPermit<'_> {
    /// Record the outcome, classifying slowness from the permit's age.
    pub fn record(mut self, failed: bool) {
        self.recorded = true;
        let slow = self.started.elapsed() > self.breaker.config.slow_call_duration();
        self.breaker.record_outcome(self.epoch, Outcome { failed, slow });
    }

    /// Record an already-classified outcome.
    pub fn record_outcome(mut self, outcome: Outcome) {
        self.recorded = true;
        self.breaker.record_outcome(self.epoch, outcome);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            self.breaker.release(self.epoch);
        }
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let window = Window::new(config.sliding_window_size.max(1));
        metrics::record_breaker_state(&config.name, CircuitState::Closed.gauge());
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window,
                opened_at: None,
                half_open_issued: 0,
                epoch: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current state. Does not move Open to Half-Open.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Ask for permission to call; `None` means reject without calling.
    pub fn try_acquire_permit(&self) -> Option<CallPermit<'_>> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let waited = inner
                .opened_at
                .map_or(true, |at| at.elapsed() >= self.config.wait_duration_in_open());
            if waited {
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }

        let permitted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.half_open_issued < self.config.permitted_calls_in_half_open {
                    inner.half_open_issued += 1;
                    true
                } else {
                    false
                }
            }
        };

        if !permitted {
            metrics::record_breaker_rejection(&self.config.name);
            tracing::debug!(breaker = %self.config.name, state = ?inner.state, "Call rejected");
            return None;
        }

        Some(CallPermit {
            breaker: self,
            epoch: inner.epoch,
            started: Instant::now(),
            recorded: false,
        })
    }

    fn record_outcome(&self, epoch: u64, outcome: Outcome) {
        let mut inner = self.inner.lock();
        if epoch != inner.epoch {
            tracing::trace!(breaker = %self.config.name, "Discarding outcome from earlier state");
            return;
        }

        inner.window.push(outcome);

        match inner.state {
            CircuitState::Closed => {
                if inner.window.is_full() && self.over_threshold(&inner.window) {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                if inner.window.outcomes.len() >= self.config.permitted_calls_in_half_open {
                    let next = if self.over_threshold(&inner.window) {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    };
                    self.transition(&mut inner, next);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn release(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if epoch == inner.epoch && inner.state == CircuitState::HalfOpen {
            inner.half_open_issued = inner.half_open_issued.saturating_sub(1);
        }
    }

    fn over_threshold(&self, window: &Window) -> bool {
        window.failure_rate() >= self.config.failure_rate_threshold
            || window.slow_rate() >= self.config.slow_call_rate_threshold
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        let failure_rate = inner.window.failure_rate();
        let slow_rate = inner.window.slow_rate();

        inner.state = to;
        inner.epoch += 1;
        inner.half_open_issued = 0;
        inner.window = match to {
            CircuitState::HalfOpen => Window::new(self.config.permitted_calls_in_half_open.max(1)),
            _ => Window::new(self.config.sliding_window_size.max(1)),
        };
        inner.opened_at = (to == CircuitState::Open).then(Instant::now);

        metrics::record_breaker_state(&self.config.name, to.gauge());
        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.config.name,
                from = ?from,
                failure_rate,
                slow_rate,
                wait_ms = self.config.wait_duration_in_open_ms,
                "Circuit breaker opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                breaker = %self.config.name,
                permitted = self.config.permitted_calls_in_half_open,
                "Circuit breaker half-open"
            ),
            CircuitState::Closed => tracing::info!(
                breaker = %self.config.name,
                failure_rate,
                slow_rate,
                "Circuit breaker closed"
            ),
        }
    }

    /// Run `f` under the breaker.
    ///
    /// Rejected calls return [`ProxyError::CircuitOpen`] without running `f`.
    /// Every other error counts as a failure.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self
            .try_acquire_permit()
            .ok_or_else(|| ProxyError::CircuitOpen(self.config.name.clone()))?;

        let result = f().await;
        let failed = match &result {
            Ok(_) => false,
            Err(ProxyError::CircuitOpen(_)) => {
                drop(permit);
                return result;
            }
            Err(_) => true,
        };
        permit.record(failed);
        result
    }
}
