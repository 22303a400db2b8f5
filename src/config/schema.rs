//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the messages service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the messages service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Inbound rate limiting for write endpoints.
    pub rate_limit: RateLimitConfig,

    /// Retry policy around the mail transport.
    pub retry: RetryConfig,

    /// Circuit breaker guarding the mail transport.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Outbound mail relay settings.
    pub mail: MailConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Per-minute quota for write requests that match no named route.
    pub default_per_minute: u32,

    /// Named per-route quotas, checked in order.
    pub routes: Vec<RouteLimitConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_per_minute: 100,
            routes: vec![
                RouteLimitConfig {
                    name: "message-resend".to_string(),
                    path_prefix: "/api/messages/*/notify".to_string(),
                    requests_per_minute: 30,
                },
                RouteLimitConfig {
                    name: "contact-message".to_string(),
                    path_prefix: "/api/messages".to_string(),
                    requests_per_minute: 5,
                },
                RouteLimitConfig {
                    name: "testimonial".to_string(),
                    path_prefix: "/api/testimonials".to_string(),
                    requests_per_minute: 3,
                },
            ],
        }
    }
}

/// A named rate limit bound to a path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteLimitConfig {
    /// Limit identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match on whole segments; `*` matches any one segment.
    pub path_prefix: String,

    /// Requests allowed per client per minute.
    pub requests_per_minute: u32,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, initial call included.
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds.
    pub base_delay_ms: u64,

    /// Growth factor applied to the delay after every failed attempt.
    pub multiplier: f64,

    /// Upper bound for a single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Random extra delay as a fraction of the computed delay (0.0 disables jitter).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept in the sliding window.
    pub sliding_window_size: usize,

    /// Outcomes required before the failure rate is evaluated.
    pub minimum_number_of_calls: usize,

    /// Failure rate, in percent, at or above which the circuit opens.
    pub failure_rate_threshold: f64,

    /// Seconds the circuit stays open before a probe is allowed.
    pub wait_duration_in_open_state_secs: u64,

    /// Calls slower than this (milliseconds) are recorded as failures.
    pub slow_call_duration_threshold_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 5,
            minimum_number_of_calls: 5,
            failure_rate_threshold: 100.0,
            wait_duration_in_open_state_secs: 30,
            slow_call_duration_threshold_ms: 5000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn wait_duration_in_open_state(&self) -> Duration {
        Duration::from_secs(self.wait_duration_in_open_state_secs)
    }

    pub fn slow_call_duration_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_call_duration_threshold_ms)
    }
}

/// How the dispatcher waits on the retry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// The HTTP caller waits for the whole retry sequence.
    #[default]
    Inline,
    /// First attempt inline, remaining attempts on a background task.
    Background,
}

/// Outbound mail relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailConfig {
    /// HTTP endpoint of the mail relay. Absent disables notifications.
    pub relay_url: Option<String>,

    /// Bearer token sent to the relay.
    pub api_key: Option<String>,

    /// Recipient of contact notifications.
    pub admin_email: String,

    /// Sender address used for notifications.
    pub from_address: String,

    /// Per-attempt relay timeout in milliseconds.
    pub timeout_ms: u64,

    /// Delivery mode.
    pub delivery: DeliveryMode,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            api_key: None,
            admin_email: "admin@example.com".to_string(),
            from_address: "no-reply@example.com".to_string(),
            timeout_ms: 5000,
            delivery: DeliveryMode::Inline,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Require the bearer key on admin and message-read routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
