//! Mail transport boundary.
//!
//! # Responsibilities
//! - Define the outbound message shape and the async transport trait
//! - Deliver messages through an HTTP mail relay
//! - Convert relay and network failures into structured [`MailError`]s
//!
//! # Design Decisions
//! - The transport makes exactly one attempt; retries live in the dispatcher
//! - Relay response text is interpreted here and nowhere else

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;
use crate::messages::Message;
use crate::notification::error::MailError;

/// An outbound e-mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub to: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// Notification sent to the site owner when a visitor submits a message.
    pub fn contact_notification(config: &MailConfig, message: &Message) -> Self {
        Self {
            to: config.admin_email.clone(),
            from: config.from_address.clone(),
            reply_to: Some(message.sender_email.clone()),
            subject: format!("New Contact Message: {}", message.subject),
            body: format!(
                "You have received a new contact message.\n\n\
                 From: {} <{}>\n\
                 Subject: {}\n\
                 Received: {}\n\n\
                 {}\n",
                message.sender_name,
                message.sender_email,
                message.subject,
                message.created_at.to_rfc3339(),
                message.message,
            ),
        }
    }
}

/// Sends one message, once.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Delivers mail by POSTing JSON to an HTTP relay.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRelayTransport {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url, api_key))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }

    /// Build the relay transport if `mail.relay_url` is set.
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>, reqwest::Error> {
        config
            .relay_url
            .as_ref()
            .map(|url| {
                Self::new(
                    url.clone(),
                    config.api_key.clone(),
                    Duration::from_millis(config.timeout_ms),
                )
            })
            .transpose()
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MailTransport for HttpRelayTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let mut request = self.client.post(&self.url).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(relay = %self.url, to = %message.to, "Mail relay accepted message");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::from_relay_response(status.as_u16(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_contact_notification_addresses() {
        let config = MailConfig::default();
        let now = Utc::now();
        let message = Message {
            id: 7,
            sender_name: "Ada".into(),
            sender_email: "ada@example.com".into(),
            subject: "Project enquiry".into(),
            message: "Are you available?".into(),
            is_read: false,
            created_at: now,
            updated_at: now,
        };

        let mail = MailMessage::contact_notification(&config, &message);
        assert_eq!(mail.to, config.admin_email);
        assert_eq!(mail.from, config.from_address);
        assert_eq!(mail.reply_to.as_deref(), Some("ada@example.com"));
        assert_eq!(mail.subject, "New Contact Message: Project enquiry");
        assert!(mail.body.contains("From: Ada <ada@example.com>"));
        assert!(mail.body.contains("Are you available?"));
    }

    #[test]
    fn test_no_relay_means_no_transport() {
        let config = MailConfig::default();
        assert!(HttpRelayTransport::from_config(&config).unwrap().is_none());
    }
}
