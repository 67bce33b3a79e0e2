//! Outgoing email.
//!
//! Messages are plain text. Delivery is synchronous from the caller's point of
//! view: once `send` returns, the message is in the outbox, on disk, or logged.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::{MailBackend, MailConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Header values never carry line breaks; anything that could start a new
/// header line is folded to a space.
fn header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

impl EmailMessage {
    /// Builds a message with single-line `from`, `to` and `subject` values.
    #[must_use]
    pub fn new(from: &str, to: Vec<String>, subject: &str, body: String) -> Self {
        Self {
            from: header_value(from),
            to: to.iter().map(|addr| header_value(addr)).collect(),
            subject: header_value(subject),
            body,
        }
    }

    /// RFC 5322-ish rendering used by the file spool
    #[must_use]
    pub fn to_rfc822(&self) -> String {
        let to = self
            .to
            .iter()
            .map(|addr| header_value(addr))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            header_value(&self.from),
            to,
            header_value(&self.subject),
            Utc::now().to_rfc2822(),
            self.body
        )
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Keeps every message in memory, oldest first.
#[derive(Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far
    #[must_use]
    pub fn outbox(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.clear();
        }
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(to = ?message.to, subject = %message.subject, "Queued email in memory outbox");
        self.outbox
            .lock()
            .map_err(|_| anyhow::anyhow!("Mail outbox lock poisoned"))?
            .push(message);
        Ok(())
    }
}

/// Writes each message to its own file in a spool directory.
pub struct FileMailer {
    spool_path: PathBuf,
}

impl FileMailer {
    #[must_use]
    pub fn new(spool_path: impl Into<PathBuf>) -> Self {
        Self {
            spool_path: spool_path.into(),
        }
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        tokio::fs::create_dir_all(&self.spool_path)
            .await
            .with_context(|| format!("Failed to create mail spool {}", self.spool_path.display()))?;

        let file_name = format!(
            "{}-{}.eml",
            Utc::now().format("%Y%m%dT%H%M%S"),
            uuid::Uuid::new_v4()
        );
        let path = self.spool_path.join(file_name);

        tokio::fs::write(&path, message.to_rfc822())
            .await
            .with_context(|| format!("Failed to write email to {}", path.display()))?;

        info!(to = ?message.to, subject = %message.subject, path = %path.display(), "Spooled email");
        Ok(())
    }
}

/// Drops messages after logging their envelope.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(
            to = ?message.to,
            subject = %message.subject,
            bytes = message.body.len(),
            "Email not delivered (log backend)"
        );
        Ok(())
    }
}

#[must_use]
pub fn build_mailer(config: &MailConfig) -> Arc<dyn Mailer> {
    match config.backend {
        MailBackend::Memory => Arc::new(MemoryMailer::new()),
        MailBackend::File => Arc::new(FileMailer::new(&config.spool_path)),
        MailBackend::Log => Arc::new(LogMailer),
    }
}
