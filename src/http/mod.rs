//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (assign/propagate x-request-id)
//!     → server.rs (trace span, timeout, metrics, rate limit, routes)
//!     → handlers (messages, admin, health)
//!     → response.rs (error envelope)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::ErrorBody;
pub use server::{build_router, AppState, HttpServer};
