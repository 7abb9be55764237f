//! Asynchronous notification consumer.
//!
//! Invoked per delivered topic message, not necessarily in publish order.
//! The recipient contact and preference flags are resolved here, at delivery
//! time, so changes made after publish still apply to undelivered messages.
//! One delivery attempt per message: failures are logged and the message is
//! dropped; redelivery, if any, is the transport's job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mailguard_core::Result;
use mailguard_storage::{Database, RecipientRow};

use crate::category;
use crate::mailer::{Mailer, OutboundMail};
use crate::topic::NotificationMessage;

/// Resolves a device's current recipient. Implemented by the storage layer;
/// stubbed in tests.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn recipient(&self, device_id: i64) -> Result<Option<RecipientRow>>;
}

#[async_trait]
impl DeviceDirectory for Database {
    async fn recipient(&self, device_id: i64) -> Result<Option<RecipientRow>> {
        self.notification_recipient(device_id).await
    }
}

/// How a message was handled. Skips count as processed, not as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Delivered,
    SkippedDisabled,
    SkippedUnknownDevice,
}

pub struct NotificationConsumer<D, M> {
    directory: D,
    mailer: M,
}

impl<D: DeviceDirectory, M: Mailer> NotificationConsumer<D, M> {
    pub fn new(directory: D, mailer: M) -> Self {
        Self { directory, mailer }
    }

    /// Consume loop. Runs until the topic closes; a failed message never
    /// blocks processing of subsequent ones.
    pub async fn run(self, mut messages: mpsc::UnboundedReceiver<NotificationMessage>) {
        info!("notification consumer started");
        while let Some(message) = messages.recv().await {
            match self.process(&message).await {
                Ok(outcome) => debug!(
                    notification_id = message.notification_id,
                    device_id = message.device_id,
                    ?outcome,
                    "notification processed"
                ),
                Err(e) => warn!(
                    notification_id = message.notification_id,
                    device_id = message.device_id,
                    error = %e,
                    "notification delivery failed, dropping message"
                ),
            }
        }
        info!("notification topic closed, consumer stopping");
    }

    /// Handle one message: resolve the recipient, apply preference flags,
    /// render and deliver.
    pub async fn process(&self, message: &NotificationMessage) -> Result<ProcessOutcome> {
        let Some(recipient) = self.directory.recipient(message.device_id).await? else {
            // Device deleted between publish and delivery
            return Ok(ProcessOutcome::SkippedUnknownDevice);
        };

        if !recipient.email_notifications
            || !category::enabled_for(&recipient, &message.notification_type)
        {
            return Ok(ProcessOutcome::SkippedDisabled);
        }

        let mail = render_mail(&recipient, message, Utc::now());
        self.mailer.send(&mail).await?;

        Ok(ProcessOutcome::Delivered)
    }
}

/// Render the notification body: subject plus a human-readable event summary
/// with the delivery timestamp.
pub fn render_mail(
    recipient: &RecipientRow,
    message: &NotificationMessage,
    at: DateTime<Utc>,
) -> OutboundMail {
    let formatted_time = at.format("%Y-%m-%d %H:%M:%S");
    let subject = format!("\u{1F4EC} Mailbox Alert: {}", message.notification_type);

    let text_body = format!(
        "Mailbox Notification\n\n\
         Your mailbox \"{}\" (ID: {}) has detected an event:\n\
         Event Type: {}\n\
         Time: {}\n\n\
         Check your Mail Guard app for more details.",
        recipient.name, message.device_id, message.notification_type, formatted_time
    );

    let html_body = format!(
        r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6;">
    <h2 style="color: #3366cc;">Mailbox Notification</h2>
    <p>Your mailbox &quot;{}&quot; (ID: {}) has detected an event:</p>
    <div style="background-color: #f5f5f5; padding: 15px; border-left: 4px solid #3366cc; margin: 10px 0;">
        <strong>Event Type:</strong> {}<br/>
        <strong>Time:</strong> {}<br/>
    </div>
    <p>Check your Mail Guard app for more details.</p>
</body>
</html>"#,
        recipient.name, message.device_id, message.notification_type, formatted_time
    );

    OutboundMail {
        to: recipient.email.clone(),
        to_name: recipient.name.clone(),
        subject,
        text_body,
        html_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailguard_core::MailGuardError;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct StubDirectory {
        recipient: Option<RecipientRow>,
    }

    #[async_trait]
    impl DeviceDirectory for StubDirectory {
        async fn recipient(&self, _device_id: i64) -> Result<Option<RecipientRow>> {
            Ok(self.recipient.clone())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingMailer {
        sent: Arc<Mutex<Vec<OutboundMail>>>,
        fail_subject_containing: Option<&'static str>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: &OutboundMail) -> Result<()> {
            if let Some(needle) = self.fail_subject_containing {
                if mail.subject.contains(needle) {
                    return Err(MailGuardError::delivery("provider rejected message"));
                }
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    fn recipient(enabled: bool) -> RecipientRow {
        RecipientRow {
            email: "owner@example.com".into(),
            name: "Front Door".into(),
            email_notifications: enabled,
            mail_delivered_notify: true,
            mailbox_opened_notify: true,
            mail_removed_notify: false,
            battery_low_notify: true,
        }
    }

    fn message(notification_type: &str) -> NotificationMessage {
        NotificationMessage {
            notification_id: 11,
            device_id: 3,
            notification_type: notification_type.into(),
        }
    }

    #[tokio::test]
    async fn delivers_when_category_is_enabled() {
        let mailer = RecordingMailer::default();
        let consumer = NotificationConsumer::new(
            StubDirectory {
                recipient: Some(recipient(true)),
            },
            mailer.clone(),
        );

        let outcome = consumer.process(&message("mail_delivered")).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Delivered);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@example.com");
        assert!(sent[0].subject.contains("mail_delivered"));
        assert!(sent[0].text_body.contains("ID: 3"));
    }

    #[tokio::test]
    async fn skips_when_category_flag_is_disabled() {
        let mailer = RecordingMailer::default();
        let consumer = NotificationConsumer::new(
            StubDirectory {
                recipient: Some(recipient(true)),
            },
            mailer.clone(),
        );

        // mail_removed_notify is false for this recipient
        let outcome = consumer.process(&message("mail_removed")).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::SkippedDisabled);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_when_master_toggle_is_off() {
        let mailer = RecordingMailer::default();
        let consumer = NotificationConsumer::new(
            StubDirectory {
                recipient: Some(recipient(false)),
            },
            mailer.clone(),
        );

        let outcome = consumer.process(&message("mail_delivered")).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::SkippedDisabled);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_unknown_devices_without_sending() {
        let mailer = RecordingMailer::default();
        let consumer =
            NotificationConsumer::new(StubDirectory { recipient: None }, mailer.clone());

        let outcome = consumer.process(&message("mailbox_opened")).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::SkippedUnknownDevice);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_surfaces_as_delivery_error() {
        let mailer = RecordingMailer {
            fail_subject_containing: Some("mail_delivered"),
            ..Default::default()
        };
        let consumer = NotificationConsumer::new(
            StubDirectory {
                recipient: Some(recipient(true)),
            },
            mailer,
        );

        let err = consumer.process(&message("mail_delivered")).await.unwrap_err();
        assert!(matches!(err, MailGuardError::Delivery(_)));
    }

    #[tokio::test]
    async fn run_loop_keeps_going_after_a_failed_message() {
        let mailer = RecordingMailer {
            fail_subject_containing: Some("battery_low"),
            ..Default::default()
        };
        let sent = mailer.sent.clone();
        let consumer = NotificationConsumer::new(
            StubDirectory {
                recipient: Some(recipient(true)),
            },
            mailer,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(message("battery_low")).unwrap();
        tx.send(message("mail_delivered")).unwrap();
        drop(tx);

        consumer.run(rx).await;

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("mail_delivered"));
    }

    #[test]
    fn rendered_mail_carries_the_timestamp() {
        let at = DateTime::parse_from_rfc3339("2025-03-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mail = render_mail(&recipient(true), &message("mailbox_opened"), at);

        assert!(mail.subject.ends_with("mailbox_opened"));
        assert!(mail.text_body.contains("2025-03-01 12:30:00"));
        assert!(mail.html_body.contains("Front Door"));
    }
}
