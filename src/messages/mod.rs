//! Contact messages.
//!
//! # Data Flow
//! ```text
//! POST /api/messages
//!     → handlers.rs (decode JSON)
//!     → service.rs (validate, persist via MessageStore, dispatch notification)
//!     → 201 with the saved message and its notificationStatus
//! ```

pub mod handlers;
pub mod model;
pub mod service;
pub mod store;

pub use model::{Message, MessageView, NewMessage};
pub use service::MessageService;
pub use store::{InMemoryMessageStore, MessageStore, StoreError};
