//! Outgoing mail.
//!
//! Delivery goes through the [`Mailer`] trait so the forum can run without an SMTP relay:
//! [`LogMailer`] only traces what would have been sent and keeps an in-memory outbox.

use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Message-ID / In-Reply-To / References values that thread messages in mail clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadHeaders {
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    /// HTML body.
    pub body: String,
    /// Falls back to the mailer's default sender.
    pub from: Option<String>,
    pub reply_to: Option<String>,
    pub headers: ThreadHeaders,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            from: None,
            reply_to: None,
            headers: ThreadHeaders::default(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// SMTP delivery through lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
}

impl SmtpMailer {
    /// `encryption` is "tls" (implicit TLS), "none" (local relays only) or STARTTLS otherwise.
    pub fn new(smtp: &SmtpConfig, from_email: String) -> Result<Self> {
        let mut builder = match smtp.encryption.as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
                .context("failed to create SMTP relay transport")?
                .port(smtp.port),
            "none" => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host).port(smtp.port)
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                .context("failed to create SMTP STARTTLS transport")?
                .port(smtp.port),
        };

        if let (Some(user), Some(pass)) = (&smtp.username, &smtp.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_email,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let from = email.from.as_deref().unwrap_or(&self.from_email);
        let mut builder = Message::builder()
            .from(from.parse().context("invalid from email address")?)
            .to(email.to.parse().context("invalid recipient email address")?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML);

        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse().context("invalid reply-to address")?);
        }
        if let Some(id) = &email.headers.message_id {
            builder = builder.message_id(Some(id.clone()));
        }
        if let Some(id) = &email.headers.in_reply_to {
            builder = builder.in_reply_to(id.clone());
        }
        if let Some(refs) = &email.headers.references {
            builder = builder.references(refs.clone());
        }

        builder
            .body(email.body.clone())
            .context("failed to build email message")
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .context("failed to send email")?;
        Ok(())
    }
}

/// Mailer used when no SMTP relay is configured.
#[derive(Default)]
pub struct LogMailer {
    outbox: Mutex<Vec<OutgoingEmail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything "sent" so far.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email not delivered (no SMTP relay)");
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(email.clone());
        }
        Ok(())
    }
}
