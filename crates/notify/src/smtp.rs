//! SMTP delivery via `lettre`, used when EmailJS is not configured.
//!
//! Supports STARTTLS, implicit TLS (port 465) and plain connections.

use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use vwatch_core::config::EmailConfig;

use crate::traits::{EmailMessage, EmailTransport, NotifyError};

#[derive(Debug)]
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("{addr}: {e}")))
}

impl SmtpTransport {
    /// Build from the `SMTP_*` settings in [`EmailConfig`].
    ///
    /// Port defaults to 587. Credentials come from `SMTP_USERNAME` and
    /// `SMTP_PASSWORD` when both are set; otherwise the connection is
    /// unauthenticated.
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotifyError::Config("SMTP_HOST is not set".to_string()))?;
        let from = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| NotifyError::Config("SMTP_FROM is not set".to_string()))?;
        let from = parse_mailbox(from)?;

        let port = config.smtp_port.unwrap_or(587);
        let use_tls = config.smtp_tls.unwrap_or(true);

        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port)
        };

        if let (Ok(username), Ok(password)) =
            (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD"))
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: &EmailMessage) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&message.to)?)
            .subject(&message.subject)
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl EmailTransport for SmtpTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let email = self.build_message(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::debug!(channel = "smtp", subject = %message.subject, "SMTP message accepted");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "smtp"
    }
}
