//! Portfolio messages service.
//!
//! Accepts contact messages, stores them, and notifies the site owner by
//! mail through a rate-limited, retrying, circuit-broken dispatch path.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod messages;
pub mod notification;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::ServiceConfig;
pub use error::{ApiError, FailureCode};
pub use http::{build_router, AppState, HttpServer};
pub use lifecycle::Shutdown;
pub use notification::{NotificationDispatcher, NotificationStatus};
