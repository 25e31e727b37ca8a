//! # Outgoing mail
//!
//! The OTP flow only needs one kind of message, so [`Mailer`] sends an
//! [`OtpMessage`]. [`SmtpMailer`] relays through an authenticated SMTP server
//! over TLS (e.g. Gmail with an app password). [`OutboxMailer`] logs the message
//! and keeps it in memory; the server falls back to it when no relay is
//! configured, and tests read codes back from it.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::MailSettings;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail.smtp_host is not set")]
    NotConfigured,

    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// An email carrying a one-time password.
#[derive(Debug, Clone, PartialEq)]
pub struct OtpMessage {
    pub to: String,
    pub code: String,
}

impl OtpMessage {
    pub fn subject(&self) -> &'static str {
        "Your OTP Code"
    }

    pub fn html(&self) -> String {
        format!("<p>Your OTP is <strong>{}</strong></p>", self.code)
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: OtpMessage) -> Result<(), MailError>;
}

/// Sends mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let host = settings.smtp_host.as_deref().ok_or(MailError::NotConfigured)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
            .credentials(Credentials::new(
                settings.smtp_username.clone(),
                settings.smtp_password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: settings.from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: OtpMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(message.to.parse::<Mailbox>()?)
            .subject(message.subject())
            .header(ContentType::TEXT_HTML)
            .body(message.html())?;

        self.transport.send(email).await?;
        Ok(())
    }
}

/// Logs messages and keeps them in memory instead of delivering them.
#[derive(Clone, Debug, Default)]
pub struct OutboxMailer {
    sent: Arc<Mutex<Vec<OtpMessage>>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message sent so far, oldest first.
    pub fn sent(&self) -> Vec<OtpMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The code in the most recent message to `to`.
    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|m| m.to == to)
            .map(|m| m.code.clone())
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, message: OtpMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, code = %message.code, "OTP mail kept in outbox");
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}
