//! Two-phase notification dispatch: record the row synchronously, publish to
//! the fan-out topic, and let the consumer deliver asynchronously. The
//! ingesting request never waits on delivery.

use std::sync::Arc;

use sqlx::PgConnection;

use mailguard_core::Result;
use mailguard_storage::Database;

use crate::topic::{NotificationMessage, NotificationTopic};

pub struct NotificationDispatcher {
    db: Database,
    topic: Arc<dyn NotificationTopic>,
}

impl NotificationDispatcher {
    pub fn new(db: Database, topic: Arc<dyn NotificationTopic>) -> Self {
        Self { db, topic }
    }

    /// Insert the notification row, then publish. Row creation and publish
    /// are independent failure domains: a failed publish leaves the row in
    /// place (visible via list endpoints, harmless) and the caller still
    /// gets the id back.
    pub async fn create_and_publish(
        &self,
        conn: &mut PgConnection,
        device_id: i64,
        notification_type: &str,
    ) -> Result<i64> {
        let row = self
            .db
            .create_notification(conn, device_id, notification_type)
            .await?;

        let message = NotificationMessage {
            notification_id: row.id,
            device_id,
            notification_type: notification_type.to_string(),
        };
        publish_recorded(self.topic.as_ref(), &message).await;

        Ok(row.id)
    }
}

/// Publish a message for an already-recorded notification, swallowing
/// publish failures.
async fn publish_recorded(topic: &dyn NotificationTopic, message: &NotificationMessage) {
    if let Err(e) = topic.publish(message).await {
        tracing::error!(
            notification_id = message.notification_id,
            device_id = message.device_id,
            error = %e,
            "notification publish failed, row kept without delivery"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::InProcessTopic;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use mailguard_core::MailGuardError;

    struct FailingTopic;

    #[async_trait]
    impl NotificationTopic for FailingTopic {
        async fn publish(&self, _message: &NotificationMessage) -> mailguard_core::Result<()> {
            Err(MailGuardError::Internal(anyhow!("broker down")))
        }
    }

    fn message() -> NotificationMessage {
        NotificationMessage {
            notification_id: 5,
            device_id: 9,
            notification_type: "mail_delivered".into(),
        }
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed_after_insert() {
        // Must not propagate: the row already exists and stays valid
        publish_recorded(&FailingTopic, &message()).await;
    }

    #[tokio::test]
    async fn successful_publish_reaches_the_topic() {
        let (topic, mut rx) = InProcessTopic::channel();
        publish_recorded(&topic, &message()).await;
        assert_eq!(rx.recv().await.unwrap(), message());
    }
}
