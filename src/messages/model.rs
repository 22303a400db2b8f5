//! Contact message entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notification::NotificationStatus;

/// A persisted contact message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub sender_name: String,
    pub sender_email: String,
    pub subject: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for submitting a contact message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub sender_email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl NewMessage {
    /// Field-level problems as `(field, reason)` pairs.
    pub fn validate(&self) -> Vec<(&'static str, String)> {
        let mut errors = Vec::new();
        check_text(&mut errors, "senderName", &self.sender_name, 100);
        check_text(&mut errors, "subject", &self.subject, 200);
        check_text(&mut errors, "message", &self.message, 5000);

        let email = self.sender_email.trim();
        if email.is_empty() {
            errors.push(("senderEmail", "must not be blank".to_string()));
        } else if !looks_like_email(email) {
            errors.push(("senderEmail", "must be a well-formed email address".to_string()));
        }
        errors
    }
}

fn check_text(errors: &mut Vec<(&'static str, String)>, field: &'static str, value: &str, max: usize) {
    let value = value.trim();
    if value.is_empty() {
        errors.push((field, "must not be blank".to_string()));
    } else if value.chars().count() > max {
        errors.push((field, format!("size must be at most {max}")));
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// A message together with the outcome of its notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub notification_status: NotificationStatus,
}
