//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming write request:
//!     → rate_limit.rs (per-client bucket for the matched route)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Limits are resolved by path prefix; the default limit catches the rest
//! - Rejections short-circuit before any handler or dispatcher work

pub mod rate_limit;

pub use rate_limit::{client_key, rate_limit_middleware, LimitStats, RateLimiter, RouteLimits};
