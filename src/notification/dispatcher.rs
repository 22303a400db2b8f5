//! Resilient notification dispatch.
//!
//! # Data Flow
//! ```text
//! dispatch(message)
//!     → no transport configured?      → MAIL_DISABLED
//!     → CircuitBreaker::try_acquire   → rejected: CIRCUIT_BREAKER_OPEN
//!     → RetryPolicy around transport.send
//!         → success                   → SUCCESS
//!         → permanent failure         → MAIL_PROVIDER_ERROR
//!         → attempts used up          → RETRY_EXHAUSTED
//!     → final outcome recorded on the breaker permit
//! ```
//!
//! In background mode the first attempt runs inline. A retryable failure
//! returns RETRY_IN_PROGRESS and the rest of the schedule continues on a
//! spawned task that records the final outcome and stops at shutdown.
//!
//! Failures never escape as errors: every path yields a [`NotificationStatus`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;

use crate::config::{DeliveryMode, ServiceConfig};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::notification::error::MailError;
use crate::notification::status::NotificationStatus;
use crate::notification::transport::{MailMessage, MailTransport};
use crate::resilience::{
    CallOutcome, CallPermit, CircuitBreaker, Retried, RetryAttempt, RetryError, RetryPolicy,
};

type SendFuture = Pin<Box<dyn Future<Output = Result<(), MailError>> + Send>>;

/// Name of the breaker guarding the mail transport.
pub const MAIL_CIRCUIT: &str = "mailService";

/// Orchestrates the circuit breaker and retry policy around the mail transport.
pub struct NotificationDispatcher {
    transport: Option<Arc<dyn MailTransport>>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    mode: DeliveryMode,
    shutdown: Arc<Shutdown>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("enabled", &self.transport.is_some())
            .field("breaker", &self.breaker)
            .field("retry", &self.retry)
            .field("mode", &self.mode)
            .finish()
    }
}

impl NotificationDispatcher {
    pub fn new(
        transport: Option<Arc<dyn MailTransport>>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            breaker,
            retry,
            mode: DeliveryMode::Inline,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn from_config(
        config: &ServiceConfig,
        transport: Option<Arc<dyn MailTransport>>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            MAIL_CIRCUIT,
            config.circuit_breaker.clone(),
        ));
        Self::new(transport, breaker, RetryPolicy::from_config(&config.retry))
            .with_delivery_mode(config.mail.delivery)
            .with_shutdown(shutdown)
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Background deliveries stop when `shutdown` is triggered.
    pub fn with_shutdown(mut self, shutdown: Arc<Shutdown>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send `message`, reporting the outcome as a status value.
    pub async fn dispatch(&self, message: &MailMessage) -> NotificationStatus {
        let Some(transport) = &self.transport else {
            tracing::debug!("Mail transport not configured, skipping notification");
            return report(NotificationStatus::disabled());
        };

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(open) => {
                tracing::warn!(
                    circuit = %open.name,
                    retry_after = ?open.retry_after,
                    "Notification rejected by circuit breaker"
                );
                return report(NotificationStatus::circuit_breaker_open(open.to_string()));
            }
        };

        let op = send_op(Arc::clone(transport), Arc::new(message.clone()));
        match self.mode {
            DeliveryMode::Inline => report(settle(permit, self.retry.execute(op).await)),
            DeliveryMode::Background => self.dispatch_background(permit, op).await,
        }
    }

    async fn dispatch_background<F>(&self, permit: CallPermit, mut op: F) -> NotificationStatus
    where
        F: FnMut(RetryAttempt) -> SendFuture + Send + 'static,
    {
        let started = Instant::now();
        let cause = match op(RetryAttempt::first()).await {
            Ok(()) => {
                permit.record(CallOutcome::Success, started.elapsed());
                return report(NotificationStatus::success(0));
            }
            Err(cause) => cause,
        };
        let elapsed = started.elapsed();

        if !self.retry.will_retry(1, &cause) {
            return report(settle(permit, self.retry.resume(1, cause, elapsed, op).await));
        }

        let status = NotificationStatus::retry_in_progress(cause.to_string(), 1);
        let retry = self.retry.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                result = retry.resume(1, cause, elapsed, op) => {
                    report(settle(permit, result));
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, abandoning background notification");
                }
            }
        });

        report(status)
    }
}

/// A retryable closure making one transport call per attempt.
fn send_op(
    transport: Arc<dyn MailTransport>,
    message: Arc<MailMessage>,
) -> impl FnMut(RetryAttempt) -> SendFuture + Send + 'static {
    move |attempt: RetryAttempt| -> SendFuture {
        let transport = Arc::clone(&transport);
        let message = Arc::clone(&message);
        Box::pin(async move {
            tracing::debug!(
                attempt = attempt.number,
                delay = ?attempt.applied_delay,
                to = %message.to,
                "Sending notification"
            );
            transport.send(&message).await
        })
    }
}

/// Feed the final outcome to the breaker and translate it into a status.
fn settle(
    permit: CallPermit,
    result: Result<Retried<()>, RetryError<MailError>>,
) -> NotificationStatus {
    match result {
        Ok(done) => {
            permit.record(CallOutcome::Success, done.last_attempt);
            NotificationStatus::success(done.attempts - 1)
        }
        Err(err) => {
            permit.record(CallOutcome::Failure, err.last_attempt());
            match err {
                RetryError::Exhausted { cause, attempts, .. } => {
                    NotificationStatus::retry_exhausted(cause.to_string(), attempts)
                }
                RetryError::Permanent { cause, attempts, .. } => {
                    NotificationStatus::provider_error(cause.to_string(), attempts)
                }
            }
        }
    }
}

fn report(status: NotificationStatus) -> NotificationStatus {
    if status.sent {
        tracing::info!(retries = status.retry_count, "Notification sent");
    } else {
        tracing::warn!(
            status = status.status.as_str(),
            retry_count = status.retry_count,
            cause = status.error_cause.as_deref().unwrap_or(""),
            "Notification not delivered"
        );
    }
    metrics::record_notification(status.status.as_str());
    status
}
