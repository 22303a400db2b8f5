//! Contact message use cases.
//!
//! # Design Decisions
//! - The message is persisted before notifying; a failed notification never
//!   undoes the write
//! - Notification outcomes are returned as values, store failures as errors

use std::sync::Arc;

use crate::config::MailConfig;
use crate::error::ApiError;
use crate::messages::model::{Message, MessageView, NewMessage};
use crate::messages::store::{MessageStore, StoreError};
use crate::notification::{MailMessage, NotificationDispatcher, NotificationStatus};

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

pub struct MessageService {
    store: Arc<dyn MessageStore>,
    dispatcher: Arc<NotificationDispatcher>,
    mail: MailConfig,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        dispatcher: Arc<NotificationDispatcher>,
        mail: MailConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            mail,
        }
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    /// Validate, persist, then notify the site owner.
    pub async fn create(&self, input: NewMessage) -> Result<MessageView, ApiError> {
        let problems = input.validate();
        if !problems.is_empty() {
            return Err(ApiError::BadRequest {
                errors: problems
                    .into_iter()
                    .map(|(field, reason)| (field.to_string(), reason))
                    .collect(),
            });
        }

        let message = self.store.insert(input).await?;
        tracing::info!(message_id = message.id, "Contact message saved");

        let notification_status = self.notify(&message).await;
        Ok(MessageView {
            message,
            notification_status,
        })
    }

    pub async fn list(&self) -> Result<Vec<Message>, ApiError> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: u64) -> Result<Message, ApiError> {
        self.store
            .get(id)
            .await?
            .ok_or(ApiError::MessageNotFound(id))
    }

    /// Send the notification for an existing message again.
    pub async fn resend(&self, id: u64) -> Result<NotificationStatus, ApiError> {
        let message = self.get(id).await?;
        Ok(self.notify(&message).await)
    }

    async fn notify(&self, message: &Message) -> NotificationStatus {
        let mail = MailMessage::contact_notification(&self.mail, message);
        let status = self.dispatcher.dispatch(&mail).await;
        if !status.sent {
            tracing::warn!(
                message_id = message.id,
                status = status.status.as_str(),
                "Message saved without notification"
            );
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::messages::store::InMemoryMessageStore;
    use crate::notification::{DeliveryState, MailError, MailTransport, MAIL_CIRCUIT};
    use crate::resilience::{CircuitBreaker, ExponentialBackoff, RetryPolicy};
    use async_trait::async_trait;
    use std::time::Duration;

    struct AlwaysTimesOut;

    #[async_trait]
    impl MailTransport for AlwaysTimesOut {
        async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
            Err(MailError::from_message("Connection timed out"))
        }
    }

    fn service(transport: Option<Arc<dyn MailTransport>>) -> (MessageService, Arc<InMemoryMessageStore>) {
        let store = Arc::new(InMemoryMessageStore::new());
        let dispatcher = NotificationDispatcher::new(
            transport,
            Arc::new(CircuitBreaker::new(MAIL_CIRCUIT, CircuitBreakerConfig::default())),
            RetryPolicy::new(3, ExponentialBackoff::new(Duration::from_secs(1), 2.0)),
        );
        let service = MessageService::new(store.clone(), Arc::new(dispatcher), MailConfig::default());
        (service, store)
    }

    fn input() -> NewMessage {
        NewMessage {
            sender_name: "Ada".into(),
            sender_email: "ada@example.com".into(),
            subject: "Hello".into(),
            message: "Nice work".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_notification_keeps_message() {
        let (service, store) = service(Some(Arc::new(AlwaysTimesOut) as Arc<dyn MailTransport>));
        let view = service.create(input()).await.unwrap();

        assert_eq!(view.notification_status.status, DeliveryState::RetryExhausted);
        assert_eq!(view.notification_status.retry_count, 3);
        assert_eq!(store.len(), 1);
        assert_eq!(service.get(view.message.id).await.unwrap(), view.message);
    }

    #[tokio::test]
    async fn test_invalid_input_is_not_saved() {
        let (service, store) = service(None);
        let mut bad = input();
        bad.sender_email = "nope".into();

        let err = service.create(bad).await.unwrap_err();
        let errors = match err {
            ApiError::BadRequest { errors } => errors,
            other => panic!("expected a validation error, got {other:?}"),
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["senderEmail"], "must be a well-formed email address");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_resend_unknown_message() {
        let (service, _) = service(None);
        assert!(matches!(service.resend(42).await, Err(ApiError::MessageNotFound(42))));

        let view = service.create(input()).await.unwrap();
        let status = service.resend(view.message.id).await.unwrap();
        assert_eq!(status.status, DeliveryState::MailDisabled);
    }
}
