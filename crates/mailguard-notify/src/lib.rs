// Notification dispatch: synchronous record + publish, asynchronous
// consume + deliver. Publisher and consumer share nothing but the message
// contract in `topic`.

pub mod category;
pub mod consumer;
pub mod dispatcher;
pub mod mailer;
pub mod topic;

pub use consumer::{DeviceDirectory, NotificationConsumer, ProcessOutcome};
pub use dispatcher::NotificationDispatcher;
pub use mailer::{HttpMailer, Mailer, MailerConfig, NoopMailer, OutboundMail};
pub use topic::{InProcessTopic, NotificationMessage, NotificationTopic};
