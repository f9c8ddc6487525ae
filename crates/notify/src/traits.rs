//! Transport trait definition and shared error types.

/// Errors that can occur during email delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport rejected message: {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML rendering of `text`.
    pub html: String,
}

/// Trait for email delivery implementations.
#[async_trait::async_trait]
pub trait EmailTransport: Send + Sync {
    /// Make one delivery attempt. `Ok` only when the transport accepted the message.
    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotifyError>;

    /// Human-readable name for this transport (e.g., "emailjs", "smtp").
    fn channel_name(&self) -> &str;
}
