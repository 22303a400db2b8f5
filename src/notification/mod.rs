//! Notification subsystem.
//!
//! # Data Flow
//! ```text
//! saved Message
//!     → transport.rs (MailMessage::contact_notification)
//!     → dispatcher.rs (circuit breaker + retry around MailTransport::send)
//!     → status.rs (NotificationStatus returned to the caller)
//! ```

pub mod dispatcher;
pub mod error;
pub mod status;
pub mod transport;

pub use dispatcher::{NotificationDispatcher, MAIL_CIRCUIT};
pub use error::{MailError, MailErrorKind};
pub use status::{DeliveryState, NotificationStatus};
pub use transport::{HttpRelayTransport, MailMessage, MailTransport};
