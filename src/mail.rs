//! Outbound email
//!
//! SMTP through `lettre` when credentials are configured, otherwise a
//! mailer that only logs.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{AppConfig, MailConfig};
use crate::error::{RegistryError, Result};

/// A plain-text message that was handed to a mailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Body of the test message sent by `/send-test-email`
pub fn test_email(to: &str, name: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Test Email".to_string(),
        body: format!("Hello {},\nThis is a test email.", name),
    }
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from = config
            .username
            .parse::<Mailbox>()
            .map_err(|e| RegistryError::ConfigError(format!("Invalid EMAIL_USERNAME: {}", e)))?;

        let transport = SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| {
                RegistryError::ConfigError(format!("Invalid SMTP relay {}: {}", config.smtp_host, e))
            })?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { from, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let to = mail
            .to
            .parse::<Mailbox>()
            .map_err(|e| RegistryError::MailError(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| RegistryError::MailError(format!("Failed to build message: {}", e)))?;

        // The SMTP transport is blocking
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| RegistryError::MailError(format!("Mail task failed: {}", e)))?
            .map_err(|e| RegistryError::MailError(e.to_string()))?;

        log::info!("Sent email to {}", mail.to);
        Ok(())
    }
}

/// Mailer used when no SMTP credentials are configured. Messages are logged
/// and kept in memory.
#[derive(Default)]
pub struct LogMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        log::info!("Email to {} not sent (no SMTP configured): {}", mail.to, mail.subject);
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

/// Builds the mailer for the configuration
pub fn mailer_from_config(config: &AppConfig) -> Result<Arc<dyn Mailer>> {
    match config.mail {
        Some(ref mail) => Ok(Arc::new(SmtpMailer::new(mail)?)),
        None => {
            log::warn!("EMAIL_USERNAME/EMAIL_PASSWORD not set, outgoing email is only logged");
            Ok(Arc::new(LogMailer::new()))
        }
    }
}
