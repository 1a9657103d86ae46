//! Email delivery interface.
//!
//! The core treats any send error as terminal-but-non-fatal: callers log
//! and move on, they never retry here and never fail the triggering
//! operation.

use async_trait::async_trait;

/// Result type for mail operations.
pub type Result<T> = std::result::Result<T, MailerError>;

/// Errors from sending mail.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("mail relay error: {0}")]
    Relay(#[from] reqwest::Error),

    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// Interface for sending a single email.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one HTML email.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}
