//! Best-effort email delivery for the check pipeline.
//!
//! [`EmailNotifier`] picks a transport once (EmailJS if configured, else
//! SMTP, else none) and exposes a `send` that reports success as a bool.
//! It never returns an error and never retries.

use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use vwatch_core::config::EmailConfig;
use vwatch_core::ViolationRecord;

use crate::emailjs::EmailJsTransport;
use crate::report::{render_report, text_to_html};
use crate::smtp::SmtpTransport;
use crate::traits::{EmailMessage, EmailTransport};

pub struct EmailNotifier {
    config: EmailConfig,
    transport: OnceLock<Option<Arc<dyn EmailTransport>>>,
}

impl EmailNotifier {
    pub fn from_config(config: EmailConfig) -> Self {
        Self {
            config,
            transport: OnceLock::new(),
        }
    }

    /// A notifier that always delivers through `transport`.
    pub fn with_transport(transport: Arc<dyn EmailTransport>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(transport));
        Self {
            config: EmailConfig::default(),
            transport: cell,
        }
    }

    /// A notifier with no transport; every send reports failure.
    pub fn disabled() -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(None);
        Self {
            config: EmailConfig::default(),
            transport: cell,
        }
    }

    /// Select the transport. Safe to call more than once; only the first
    /// call does any work.
    pub fn initialize(&self) {
        self.transport();
    }

    pub fn is_enabled(&self) -> bool {
        self.transport().is_some()
    }

    fn transport(&self) -> Option<&Arc<dyn EmailTransport>> {
        self.transport
            .get_or_init(|| select_transport(&self.config))
            .as_ref()
    }

    /// Send a plain-text body (with a derived HTML variant).
    /// `true` only when the transport accepted the message.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        let message = EmailMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            text: body.to_string(),
            html: text_to_html(body),
        };
        self.deliver(&message).await
    }

    /// Render and send the report for a finished check.
    pub async fn send_report(&self, to: &str, new_violations: &[ViolationRecord]) -> bool {
        let report = match render_report(new_violations) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Failed to render violation report");
                return false;
            }
        };
        self.send(to, &report.subject, &report.text).await
    }

    /// Send a short message confirming the email settings work.
    pub async fn send_test(&self, to: &str) -> bool {
        self.send(
            to,
            "Pittsburgh violation check: test email",
            "This is a test message. Violation reports will be delivered to this address.",
        )
        .await
    }

    async fn deliver(&self, message: &EmailMessage) -> bool {
        let Some(transport) = self.transport() else {
            warn!(to = %message.to, "Email is not configured; message not sent");
            return false;
        };

        match transport.deliver(message).await {
            Ok(()) => {
                info!(
                    channel = transport.channel_name(),
                    to = %message.to,
                    subject = %message.subject,
                    "Email delivered"
                );
                true
            }
            Err(e) => {
                warn!(
                    channel = transport.channel_name(),
                    to = %message.to,
                    error = %e,
                    "Email delivery failed"
                );
                false
            }
        }
    }
}

fn select_transport(config: &EmailConfig) -> Option<Arc<dyn EmailTransport>> {
    if config.emailjs_configured() {
        match EmailJsTransport::from_config(config) {
            Ok(t) => {
                info!("Email notifier using EmailJS");
                return Some(Arc::new(t));
            }
            Err(e) => warn!(error = %e, "EmailJS configuration invalid"),
        }
    }
    if config.smtp_configured() {
        match SmtpTransport::from_config(config) {
            Ok(t) => {
                info!("Email notifier using SMTP");
                return Some(Arc::new(t));
            }
            Err(e) => warn!(error = %e, "SMTP configuration invalid"),
        }
    }
    warn!("No email transport configured (EMAILJS_* or SMTP_*); email reports disabled");
    None
}
