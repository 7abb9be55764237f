//! Fan-out topic decoupling notification creation from delivery.
//!
//! The publisher and the consumer coordinate only through
//! `NotificationMessage`; the consumer is deployed independently, so the
//! serialized field names are a stable contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use anyhow::anyhow;
use mailguard_core::{MailGuardError, Result};

/// The only contract between publisher and consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub notification_id: i64,
    pub device_id: i64,
    pub notification_type: String,
}

/// Publish side of the fan-out topic. An external broker (SNS-style) plugs
/// in here; the default is the in-process channel below.
#[async_trait]
pub trait NotificationTopic: Send + Sync {
    async fn publish(&self, message: &NotificationMessage) -> Result<()>;
}

/// In-process topic backed by an unbounded mpsc channel.
///
/// The publishing caller never waits for a consumer to run; the receiver is
/// handed to a consumer task at startup.
#[derive(Clone)]
pub struct InProcessTopic {
    tx: mpsc::UnboundedSender<NotificationMessage>,
}

impl InProcessTopic {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationTopic for InProcessTopic {
    async fn publish(&self, message: &NotificationMessage) -> Result<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| MailGuardError::Internal(anyhow!("notification topic closed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_contract_field_names_are_stable() {
        let message = NotificationMessage {
            notification_id: 42,
            device_id: 7,
            notification_type: "mail_delivered".into(),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "notification_id": 42,
                "device_id": 7,
                "notification_type": "mail_delivered",
            })
        );

        let parsed: NotificationMessage = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, message);
    }

    #[tokio::test]
    async fn published_messages_reach_the_receiver() {
        let (topic, mut rx) = InProcessTopic::channel();
        let message = NotificationMessage {
            notification_id: 1,
            device_id: 2,
            notification_type: "mailbox_opened".into(),
        };

        topic.publish(&message).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), message);
    }

    #[tokio::test]
    async fn publish_fails_when_consumer_is_gone() {
        let (topic, rx) = InProcessTopic::channel();
        drop(rx);

        let err = topic
            .publish(&NotificationMessage {
                notification_id: 1,
                device_id: 2,
                notification_type: "mailbox_opened".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailGuardError::Internal(_)));
    }
}
