//! Circuit breaker for mail transport protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: transport assumed down, calls fail fast
//! - Half-Open: a single probe call tests whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: window holds >= minimum_number_of_calls and failure rate >= threshold
//! Open → Half-Open: first call after wait_duration_in_open_state
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - Count-based sliding window of the most recent outcomes
//! - Slow successes are recorded as failures
//! - Exactly one probe in Half-Open; an abandoned probe permit frees the slot on drop

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }

    fn gauge_value(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a guarded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// Returned instead of a permit when the circuit rejects a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("CircuitBreaker '{name}' is {state} and does not permit further calls")]
pub struct CircuitOpen {
    pub name: String,
    pub state: CircuitState,
    /// Time left before a probe will be admitted.
    pub retry_after: Duration,
}

/// Callback invoked on every state transition with `(from, to)`.
pub type TransitionListener = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

/// Point-in-time view of a breaker, for the admin API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    /// Failure rate in percent; absent until the minimum number of calls is buffered.
    pub failure_rate: Option<f64>,
    pub millis_in_state: u128,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// `true` entries are failures.
    window: VecDeque<bool>,
    last_transition: Instant,
    probe_in_flight: bool,
}

impl Inner {
    fn failures(&self) -> usize {
        self.window.iter().filter(|failed| **failed).count()
    }

    fn failure_rate(&self, minimum_calls: usize) -> Option<f64> {
        if self.window.is_empty() || self.window.len() < minimum_calls {
            return None;
        }
        Some(self.failures() as f64 * 100.0 / self.window.len() as f64)
    }

    fn transition(&mut self, to: CircuitState) -> Option<(CircuitState, CircuitState)> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        self.last_transition = Instant::now();
        self.probe_in_flight = false;
        if to != CircuitState::HalfOpen {
            self.window.clear();
        }
        Some((from, to))
    }
}

/// Count-based circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    listener: Option<TransitionListener>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let capacity = config.sliding_window_size.max(1);
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(capacity),
                last_transition: Instant::now(),
                probe_in_flight: false,
            }),
            listener: None,
        }
    }

    /// Register a hook that observes every state transition.
    pub fn with_listener(mut self, listener: TransitionListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Ask to make a call. Moves Open to Half-Open once the wait has elapsed.
    pub fn try_acquire(self: &Arc<Self>) -> Result<CallPermit, CircuitOpen> {
        let (result, transition) = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => (Ok(false), None),
                CircuitState::Open => {
                    let wait = self.config.wait_duration_in_open_state();
                    let elapsed = inner.last_transition.elapsed();
                    if elapsed >= wait {
                        let transition = inner.transition(CircuitState::HalfOpen);
                        inner.probe_in_flight = true;
                        (Ok(true), transition)
                    } else {
                        (Err(self.rejection(CircuitState::Open, wait - elapsed)), None)
                    }
                }
                CircuitState::HalfOpen if inner.probe_in_flight => {
                    (Err(self.rejection(CircuitState::HalfOpen, Duration::ZERO)), None)
                }
                CircuitState::HalfOpen => {
                    inner.probe_in_flight = true;
                    (Ok(true), None)
                }
            }
        };

        if let Some((from, to)) = transition {
            self.notify(from, to);
        }

        result.map(|probe| CallPermit {
            breaker: Arc::clone(self),
            probe,
            settled: false,
        })
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            buffered_calls: inner.window.len(),
            failed_calls: inner.failures(),
            failure_rate: inner.failure_rate(self.config.minimum_number_of_calls),
            millis_in_state: inner.last_transition.elapsed().as_millis(),
        }
    }

    fn rejection(&self, state: CircuitState, retry_after: Duration) -> CircuitOpen {
        CircuitOpen {
            name: self.name.clone(),
            state,
            retry_after,
        }
    }

    fn on_result(&self, probe: bool, outcome: CallOutcome, elapsed: Duration) {
        let slow = elapsed > self.config.slow_call_duration_threshold();
        if outcome == CallOutcome::Success && slow {
            tracing::warn!(
                circuit = %self.name,
                elapsed = ?elapsed,
                "Slow call recorded as failure"
            );
        }
        let failed = outcome == CallOutcome::Failure || slow;

        let transition = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    if inner.window.len() >= self.config.sliding_window_size.max(1) {
                        inner.window.pop_front();
                    }
                    inner.window.push_back(failed);

                    match inner.failure_rate(self.config.minimum_number_of_calls) {
                        Some(rate) if rate >= self.config.failure_rate_threshold => {
                            inner.transition(CircuitState::Open)
                        }
                        _ => None,
                    }
                }
                CircuitState::HalfOpen if probe => {
                    if failed {
                        inner.transition(CircuitState::Open)
                    } else {
                        inner.transition(CircuitState::Closed)
                    }
                }
                // Late results from calls admitted before the circuit opened.
                CircuitState::HalfOpen | CircuitState::Open => None,
            }
        };

        if failed {
            tracing::debug!(circuit = %self.name, "Circuit breaker recorded failure");
        } else {
            tracing::debug!(circuit = %self.name, "Circuit breaker recorded success");
        }

        if let Some((from, to)) = transition {
            self.notify(from, to);
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        tracing::warn!(
            circuit = %self.name,
            from = %from,
            to = %to,
            "Circuit breaker state transition"
        );
        metrics::record_circuit_transition(from.as_str(), to.as_str(), to.gauge_value());
        if let Some(listener) = &self.listener {
            listener(from, to);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to make one guarded call.
///
/// Report the outcome with [`record`](Self::record). Dropping an unrecorded
/// Half-Open probe frees the probe slot for the next caller.
#[must_use = "a permit must be settled with record()"]
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl CallPermit {
    /// Whether this call is the Half-Open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record(mut self, outcome: CallOutcome, elapsed: Duration) {
        self.settled = true;
        self.breaker.on_result(self.probe, outcome, elapsed);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if self.probe && !self.settled {
            self.breaker.release_probe();
        }
    }
}
