//! Per-client token bucket rate limiting for write requests.
//!
//! # Responsibilities
//! - Keep one continuously refilling bucket per (limit, client) pair
//! - Pick the limit for a request by path prefix, falling back to the default
//! - Reject with 429 and a `Retry-After` hint when the bucket is empty
//!
//! # Design Decisions
//! - Buckets start full and refill at `quota / 60` tokens per second
//! - Bucket state is kept in integer units so a full interval refills exactly the quota
//! - A request consumes all of its cost or nothing
//! - Route prefixes match whole path segments
//! - Read requests are never limited
//! - Buckets are per process; replicas do not share counts

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::observability::metrics;

/// Bucket units per token: nanoseconds in one refill interval.
///
/// A quota of `q` per minute refills exactly `q` units per elapsed nanosecond.
const UNITS_PER_TOKEN: u128 = 60 * 1_000_000_000;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    units: u128,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u128) -> Self {
        Self {
            units: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, cost: u128, capacity: u128, quota: u128) -> Result<(), Duration> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_nanos();
        self.units = self
            .units
            .saturating_add(elapsed.saturating_mul(quota))
            .min(capacity);
        self.last_refill = now;

        if self.units >= cost {
            self.units -= cost;
            Ok(())
        } else {
            Err(nanos_until(cost - self.units, quota))
        }
    }
}

/// Time for `deficit` units to refill, rounded up to the nanosecond.
fn nanos_until(deficit: u128, quota: u128) -> Duration {
    let nanos = deficit.div_ceil(quota);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Token buckets keyed by client, all sharing one quota.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    quota: u32,
    buckets: DashMap<String, TokenBucket>,
}

impl RateLimiter {
    /// `quota` requests per minute, with a burst of the full quota.
    pub fn per_minute(name: impl Into<String>, quota: u32) -> Self {
        Self {
            name: name.into(),
            quota: quota.max(1),
            buckets: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.quota
    }

    fn capacity(&self) -> u128 {
        u128::from(self.quota) * UNITS_PER_TOKEN
    }

    /// Consume `cost` tokens for `key`, or report how long until they are available.
    pub fn check(&self, key: &str, cost: u32) -> Result<(), Duration> {
        let quota = u128::from(self.quota);
        let capacity = self.capacity();
        let cost = u128::from(cost) * UNITS_PER_TOKEN;
        if cost > capacity {
            return Err(nanos_until(cost, quota));
        }
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(capacity));
        bucket.try_consume(cost, capacity, quota)
    }

    pub fn try_consume(&self, key: &str, cost: u32) -> bool {
        self.check(key, cost).is_ok()
    }

    /// Number of clients with a bucket.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}

/// Usage of one configured limit, for the admin API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStats {
    pub name: String,
    pub path_prefix: Option<String>,
    pub requests_per_minute: u32,
    pub tracked_clients: usize,
}

/// Route-aware set of limiters.
#[derive(Debug)]
pub struct RouteLimits {
    enabled: bool,
    routes: Vec<(String, RateLimiter)>,
    default: RateLimiter,
}

impl RouteLimits {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            routes: config
                .routes
                .iter()
                .map(|route| {
                    (
                        route.path_prefix.clone(),
                        RateLimiter::per_minute(route.name.clone(), route.requests_per_minute),
                    )
                })
                .collect(),
            default: RateLimiter::per_minute("default", config.default_per_minute),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// First route whose prefix matches `path`, else the default limit.
    pub fn resolve(&self, path: &str) -> &RateLimiter {
        self.routes
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map(|(_, limiter)| limiter)
            .unwrap_or(&self.default)
    }

    pub fn stats(&self) -> Vec<LimitStats> {
        self.routes
            .iter()
            .map(|(prefix, limiter)| (Some(prefix.clone()), limiter))
            .chain(std::iter::once((None, &self.default)))
            .map(|(path_prefix, limiter)| LimitStats {
                name: limiter.name().to_string(),
                path_prefix,
                requests_per_minute: limiter.requests_per_minute(),
                tracked_clients: limiter.tracked_keys(),
            })
            .collect()
    }
}

/// Segment-wise prefix match; a `*` segment matches any single segment.
///
/// `/api/messages` matches `/api/messages` and `/api/messages/3` but not
/// `/api/messagesXYZ`.
pub fn prefix_matches(prefix: &str, path: &str) -> bool {
    let mut path_segments = path.split('/').filter(|s| !s.is_empty());
    prefix
        .split('/')
        .filter(|s| !s.is_empty())
        .all(|expected| match path_segments.next() {
            Some(actual) => expected == "*" || expected == actual,
            None => false,
        })
}

fn is_write(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Client identity: first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub fn client_key<B>(request: &Request<B>) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|v| !v.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting write requests over their route's quota.
pub async fn rate_limit_middleware(
    State(limits): State<Arc<RouteLimits>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limits.is_enabled() || !is_write(request.method()) {
        return next.run(request).await;
    }

    let limiter = limits.resolve(request.uri().path());
    let client = client_key(&request);
    match limiter.check(&client, 1) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(
                client = %client,
                limit = limiter.name(),
                path = %request.uri().path(),
                retry_after = ?retry_after,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(limiter.name());
            ApiError::RateLimited {
                limit: limiter.name().to_string(),
                retry_after,
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteLimitConfig;

    #[tokio::test(start_paused = true)]
    async fn test_bucket_allows_quota_then_rejects() {
        let limiter = RateLimiter::per_minute("contact-message", 5);
        for _ in 0..5 {
            assert!(limiter.try_consume("203.0.113.7", 1));
        }
        let retry_after = limiter.check("203.0.113.7", 1).unwrap_err();
        assert_eq!(retry_after, Duration::from_secs(12));

        // Other clients have their own bucket.
        assert!(limiter.try_consume("198.51.100.1", 1));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_refills_continuously() {
        let limiter = RateLimiter::per_minute("testimonial", 3);
        for _ in 0..3 {
            assert!(limiter.try_consume("client", 1));
        }
        assert!(!limiter.try_consume("client", 1));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(limiter.try_consume("client", 1));
        assert!(!limiter.try_consume("client", 1));

        tokio::time::advance(Duration::from_secs(600)).await;
        for _ in 0..3 {
            assert!(limiter.try_consume("client", 1));
        }
        assert!(!limiter.try_consume("client", 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_interval_refills_the_whole_quota() {
        for quota in [1, 3, 5, 7, 123, 245, 490, 999] {
            let limiter = RateLimiter::per_minute("contact-message", quota);
            for _ in 0..quota {
                assert!(limiter.try_consume("client", 1));
            }
            assert!(!limiter.try_consume("client", 1));

            tokio::time::advance(Duration::from_secs(60)).await;
            let admitted = (0..quota + 1)
                .filter(|_| limiter.try_consume("client", 1))
                .count();
            assert_eq!(admitted, quota as usize, "quota {quota}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_retry_after_is_enough() {
        for quota in [5, 7, 123, 999] {
            let limiter = RateLimiter::per_minute("contact-message", quota);
            for _ in 0..quota {
                assert!(limiter.try_consume("client", 1));
            }
            let retry_after = limiter.check("client", 1).unwrap_err();
            tokio::time::advance(retry_after).await;
            assert!(limiter.try_consume("client", 1), "quota {quota}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_never_exceed_quota() {
        let limiter = Arc::new(RateLimiter::per_minute("contact-message", 50));
        let barrier = Arc::new(tokio::sync::Barrier::new(200));

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let limiter = limiter.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    limiter.try_consume("203.0.113.7", 1)
                })
            })
            .collect();

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cost_is_all_or_nothing() {
        let limiter = RateLimiter::per_minute("default", 5);
        assert!(limiter.try_consume("client", 4));
        assert!(!limiter.try_consume("client", 2));
        assert!(limiter.try_consume("client", 1));
        assert!(!limiter.try_consume("other", 6));
    }

    #[test]
    fn test_resolve_first_matching_prefix() {
        let config = RateLimitConfig {
            enabled: true,
            default_per_minute: 100,
            routes: vec![
                RouteLimitConfig {
                    name: "contact-message".into(),
                    path_prefix: "/api/messages".into(),
                    requests_per_minute: 5,
                },
                RouteLimitConfig {
                    name: "broad".into(),
                    path_prefix: "/api".into(),
                    requests_per_minute: 50,
                },
            ],
        };
        let limits = RouteLimits::from_config(&config);

        assert_eq!(limits.resolve("/api/messages").name(), "contact-message");
        assert_eq!(limits.resolve("/api/messages/3").name(), "contact-message");
        assert_eq!(limits.resolve("/api/messagesXYZ").name(), "broad");
        assert_eq!(limits.resolve("/api/projects").name(), "broad");
        assert_eq!(limits.resolve("/apix").name(), "default");
        assert_eq!(limits.resolve("/other").name(), "default");
        assert_eq!(limits.stats().len(), 3);
    }

    #[test]
    fn test_default_routes_keep_resends_off_the_contact_quota() {
        let limits = RouteLimits::from_config(&RateLimitConfig::default());

        assert_eq!(limits.resolve("/api/messages").name(), "contact-message");
        assert_eq!(limits.resolve("/api/messages/").name(), "contact-message");
        assert_eq!(limits.resolve("/api/messages/3/notify").name(), "message-resend");
        assert_eq!(limits.resolve("/api/testimonials").name(), "testimonial");
        assert_eq!(limits.resolve("/api/messagesXYZ").name(), "default");
    }

    #[test]
    fn test_prefix_matches_whole_segments() {
        assert!(prefix_matches("/api/messages", "/api/messages"));
        assert!(prefix_matches("/api/messages", "/api/messages/7"));
        assert!(!prefix_matches("/api/messages", "/api/messagesXYZ"));
        assert!(!prefix_matches("/api/messages", "/api"));
        assert!(prefix_matches("/api/messages/*/notify", "/api/messages/42/notify"));
        assert!(!prefix_matches("/api/messages/*/notify", "/api/messages/42"));
        assert!(prefix_matches("/", "/anything"));
    }

    #[test]
    fn test_client_key_precedence() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.1")
            .body(())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.7");

        let request = Request::builder()
            .header("x-real-ip", "198.51.100.1")
            .body(())
            .unwrap();
        assert_eq!(client_key(&request), "198.51.100.1");

        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        assert_eq!(client_key(&request), "192.0.2.1");

        assert_eq!(client_key(&Request::builder().body(()).unwrap()), "unknown");
    }
}
