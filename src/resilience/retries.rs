//! Retry logic.
//!
//! # Responsibilities
//! - Run an operation up to `max_attempts` times (initial call included)
//! - Sleep the backoff delay between attempts
//! - Stop at the first permanent failure without using the remaining attempts
//! - Publish retry/success/give-up events to logs, metrics and an optional listener
//!
//! # Design Decisions
//! - Delays are `tokio` sleeps; dropping the future cancels the sequence
//! - The policy is a plain value owned by its caller, not a global registry

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::ExponentialBackoff;
use crate::resilience::classifier::{Classify, FailureClass};

/// One attempt of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Delay slept before this attempt.
    pub applied_delay: Duration,
    /// Error that caused this attempt to be scheduled.
    pub triggering_cause: Option<String>,
}

impl RetryAttempt {
    pub fn first() -> Self {
        Self {
            number: 1,
            applied_delay: Duration::ZERO,
            triggering_cause: None,
        }
    }
}

/// Observable retry transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryEvent {
    /// Attempt `attempt` failed transiently; the next one starts after `delay`.
    Retrying {
        attempt: u32,
        delay: Duration,
        cause: String,
    },
    /// The operation succeeded after at least one retry.
    Succeeded { attempts: u32 },
    /// No further attempts will be made.
    GaveUp {
        attempts: u32,
        permanent: bool,
        cause: String,
    },
}

/// Callback invoked for every [`RetryEvent`].
pub type RetryListener = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Successful result of a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts used, the successful one included.
    pub attempts: u32,
    /// Duration of the successful attempt.
    pub last_attempt: Duration,
}

/// Why a retried operation finally failed.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The error was classified as permanent; no further attempts were made.
    #[error("permanent failure on attempt {attempts}: {cause}")]
    Permanent {
        cause: E,
        attempts: u32,
        last_attempt: Duration,
    },

    /// Every allowed attempt failed.
    #[error("retries exhausted after {attempts} attempts: {cause}")]
    Exhausted {
        cause: E,
        attempts: u32,
        last_attempt: Duration,
    },
}

impl<E> RetryError<E> {
    pub fn cause(&self) -> &E {
        match self {
            Self::Permanent { cause, .. } | Self::Exhausted { cause, .. } => cause,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Duration of the final failed attempt.
    pub fn last_attempt(&self) -> Duration {
        match self {
            Self::Permanent { last_attempt, .. } | Self::Exhausted { last_attempt, .. } => {
                *last_attempt
            }
        }
    }
}

/// Bounded-attempt retry executor with exponential backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: ExponentialBackoff,
    listener: Option<RetryListener>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("listener", &self.listener.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: ExponentialBackoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            listener: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, ExponentialBackoff::from_config(config))
    }

    /// Register a hook that observes every retry event.
    pub fn with_listener(mut self, listener: RetryListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a failure of `attempt` with `cause` would be retried.
    pub fn will_retry<E: Classify>(&self, attempt: u32, cause: &E) -> bool {
        attempt < self.max_attempts && cause.classify() == FailureClass::Transient
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<Retried<T>, RetryError<E>>
    where
        F: FnMut(RetryAttempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        self.run(RetryAttempt::first(), op).await
    }

    /// Continue a sequence whose attempt `failed_attempt` already failed with `cause`.
    ///
    /// Applies the same classification, delay schedule and attempt limit as
    /// [`execute`](Self::execute), so a sequence split across tasks behaves
    /// exactly like one run in place.
    pub async fn resume<T, E, F, Fut>(
        &self,
        failed_attempt: u32,
        cause: E,
        last_attempt: Duration,
        op: F,
    ) -> Result<Retried<T>, RetryError<E>>
    where
        F: FnMut(RetryAttempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        let next = self.after_failure(failed_attempt, cause, last_attempt)?;
        self.run(next, op).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        mut next: RetryAttempt,
        mut op: F,
    ) -> Result<Retried<T>, RetryError<E>>
    where
        F: FnMut(RetryAttempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
    {
        loop {
            if !next.applied_delay.is_zero() {
                tokio::time::sleep(next.applied_delay).await;
            }

            let number = next.number;
            let started = Instant::now();
            match op(next).await {
                Ok(value) => {
                    if number > 1 {
                        self.emit(RetryEvent::Succeeded { attempts: number });
                    }
                    return Ok(Retried {
                        value,
                        attempts: number,
                        last_attempt: started.elapsed(),
                    });
                }
                Err(cause) => {
                    next = self.after_failure(number, cause, started.elapsed())?;
                }
            }
        }
    }

    /// Decide what follows a failed attempt: the next attempt, or the final error.
    fn after_failure<E>(
        &self,
        attempt: u32,
        cause: E,
        last_attempt: Duration,
    ) -> Result<RetryAttempt, RetryError<E>>
    where
        E: Classify + Display,
    {
        if cause.classify() == FailureClass::Permanent {
            self.emit(RetryEvent::GaveUp {
                attempts: attempt,
                permanent: true,
                cause: cause.to_string(),
            });
            return Err(RetryError::Permanent {
                cause,
                attempts: attempt,
                last_attempt,
            });
        }

        if attempt >= self.max_attempts {
            self.emit(RetryEvent::GaveUp {
                attempts: attempt,
                permanent: false,
                cause: cause.to_string(),
            });
            return Err(RetryError::Exhausted {
                cause,
                attempts: attempt,
                last_attempt,
            });
        }

        let delay = self.backoff.delay_after(attempt);
        let cause = cause.to_string();
        self.emit(RetryEvent::Retrying {
            attempt,
            delay,
            cause: cause.clone(),
        });
        Ok(RetryAttempt {
            number: attempt + 1,
            applied_delay: delay,
            triggering_cause: Some(cause),
        })
    }

    fn emit(&self, event: RetryEvent) {
        match &event {
            RetryEvent::Retrying { attempt, delay, cause } => {
                tracing::warn!(attempt, delay = ?delay, cause = %cause, "Mail send attempt failed, retrying");
                metrics::record_retry(*attempt);
            }
            RetryEvent::Succeeded { attempts } => {
                tracing::info!(attempts, "Mail send succeeded after retry");
            }
            RetryEvent::GaveUp { attempts, permanent: true, cause } => {
                tracing::warn!(attempts, cause = %cause, "Permanent mail failure, not retrying");
            }
            RetryEvent::GaveUp { attempts, permanent: false, cause } => {
                tracing::error!(attempts, cause = %cause, "Mail send retries exhausted");
            }
        }

        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }
}
