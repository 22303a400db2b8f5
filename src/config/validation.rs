//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. All problems are collected, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// Upper bound for any per-minute quota.
const MAX_PER_MINUTE: u32 = 100_000;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid address for {field}: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("{field} = {value} exceeds the maximum of {max}")]
    TooLarge { field: String, value: u64, max: u64 },

    #[error("rate limit route '{0}' has an empty path prefix")]
    EmptyPrefix(String),

    #[error("retry.multiplier must be greater than 1.0, got {0}")]
    Multiplier(f64),

    #[error("retry.jitter_factor must be within [0, 1], got {0}")]
    Jitter(f64),

    #[error("circuit_breaker.failure_rate_threshold must be within (0, 100], got {0}")]
    FailureRate(f64),

    #[error("circuit_breaker.sliding_window_size ({window}) is smaller than minimum_number_of_calls ({minimum})")]
    WindowTooSmall { window: usize, minimum: usize },

    #[error("invalid mail.relay_url '{value}': {reason}")]
    RelayUrl { value: String, reason: String },

    #[error("admin.api_key must not be empty while the admin API is enabled")]
    EmptyAdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(zero("timeouts.request_secs"));
    }

    check_quota(&mut errors, "rate_limit.default_per_minute".into(), config.rate_limit.default_per_minute);
    for route in &config.rate_limit.routes {
        if route.path_prefix.is_empty() {
            errors.push(ValidationError::EmptyPrefix(route.name.clone()));
        }
        check_quota(
            &mut errors,
            format!("rate_limit.routes.{}.requests_per_minute", route.name),
            route.requests_per_minute,
        );
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(zero("retry.max_attempts"));
    }
    if retry.base_delay_ms == 0 {
        errors.push(zero("retry.base_delay_ms"));
    }
    if !(retry.multiplier > 1.0) {
        errors.push(ValidationError::Multiplier(retry.multiplier));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        errors.push(ValidationError::Jitter(retry.jitter_factor));
    }

    let breaker = &config.circuit_breaker;
    if breaker.minimum_number_of_calls == 0 {
        errors.push(zero("circuit_breaker.minimum_number_of_calls"));
    }
    if breaker.sliding_window_size < breaker.minimum_number_of_calls {
        errors.push(ValidationError::WindowTooSmall {
            window: breaker.sliding_window_size,
            minimum: breaker.minimum_number_of_calls,
        });
    }
    if !(breaker.failure_rate_threshold > 0.0 && breaker.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::FailureRate(breaker.failure_rate_threshold));
    }
    if breaker.wait_duration_in_open_state_secs == 0 {
        errors.push(zero("circuit_breaker.wait_duration_in_open_state_secs"));
    }
    if breaker.slow_call_duration_threshold_ms == 0 {
        errors.push(zero("circuit_breaker.slow_call_duration_threshold_ms"));
    }

    if let Some(relay_url) = &config.mail.relay_url {
        if let Err(e) = url::Url::parse(relay_url) {
            errors.push(ValidationError::RelayUrl {
                value: relay_url.clone(),
                reason: e.to_string(),
            });
        }
    }
    if config.mail.timeout_ms == 0 {
        errors.push(zero("mail.timeout_ms"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::EmptyAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn zero(field: &str) -> ValidationError {
    ValidationError::Zero { field: field.to_string() }
}

fn check_quota(errors: &mut Vec<ValidationError>, field: String, value: u32) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    } else if value > MAX_PER_MINUTE {
        errors.push(ValidationError::TooLarge {
            field,
            value: value.into(),
            max: MAX_PER_MINUTE.into(),
        });
    }
}
