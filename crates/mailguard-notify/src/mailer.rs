//! Outbound mail delivery collaborator.
//!
//! `HttpMailer` speaks a MailerSend-style JSON API over reqwest. When mail
//! credentials are absent the api binary falls back to `NoopMailer`, which
//! logs and succeeds, so the rest of the pipeline keeps working in
//! development environments.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use serde_json::json;

use mailguard_core::{MailGuardError, Result};

const DEFAULT_API_URL: &str = "https://api.mailersend.com/v1/email";
const DEFAULT_FROM_NAME: &str = "Mail Guard";

/// A rendered notification ready for delivery
#[derive(Debug, Clone)]
pub struct OutboundMail {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// External delivery collaborator. One attempt per call; retries, if any,
/// belong to the transport, not to this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutboundMail) -> Result<()>;
}

/// Mail provider configuration from environment variables
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
}

impl MailerConfig {
    /// Requires `MAILGUARD_MAIL_API_KEY` and `MAILGUARD_MAIL_FROM`; the API
    /// URL and sender display name have defaults.
    pub fn from_env() -> AnyResult<Self> {
        let api_key = std::env::var("MAILGUARD_MAIL_API_KEY")
            .context("MAILGUARD_MAIL_API_KEY not set")?;
        let from_email =
            std::env::var("MAILGUARD_MAIL_FROM").context("MAILGUARD_MAIL_FROM not set")?;
        let api_url =
            std::env::var("MAILGUARD_MAIL_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let from_name = std::env::var("MAILGUARD_MAIL_FROM_NAME")
            .unwrap_or_else(|_| DEFAULT_FROM_NAME.into());

        Ok(Self {
            api_url,
            api_key,
            from_email,
            from_name,
        })
    }
}

/// HTTP mail provider client
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<()> {
        let payload = json!({
            "from": { "email": self.config.from_email, "name": self.config.from_name },
            "to": [{ "email": mail.to, "name": mail.to_name }],
            "subject": mail.subject,
            "text": mail.text_body,
            "html": mail.html_body,
        });

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MailGuardError::delivery(format!("mail provider request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailGuardError::delivery(format!(
                "mail provider returned {status}"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Mailer for Box<dyn Mailer> {
    async fn send(&self, mail: &OutboundMail) -> Result<()> {
        (**self).send(mail).await
    }
}

/// Used when mail is not configured; logs the would-be delivery and succeeds
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "mail delivery disabled, dropping");
        Ok(())
    }
}
