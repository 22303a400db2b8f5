//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound mail send:
//!     → circuit_breaker.rs (fail fast while the transport is known to be down)
//!     → retries.rs (re-run the send with exponential backoff)
//!         → classifier.rs (decide whether a failure is worth retrying)
//!         → backoff.rs (compute the wait before the next attempt)
//!     → outcome fed back into the circuit breaker window
//! ```
//!
//! # Design Decisions
//! - Policies are plain values owned by the dispatcher, no global registry
//! - Unknown failures are retried
//! - One breaker outcome per dispatch, not per attempt

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod retries;

pub use backoff::ExponentialBackoff;
pub use circuit_breaker::{
    CallOutcome, CallPermit, CircuitBreaker, CircuitOpen, CircuitSnapshot, CircuitState,
    TransitionListener,
};
pub use classifier::{classify, Classify, FailureClass};
pub use retries::{RetryAttempt, RetryError, RetryEvent, RetryListener, RetryPolicy, Retried};
