//! EmailJS transactional email transport.
//!
//! Posts the message as template parameters to the EmailJS REST send
//! endpoint. The service id, template id and account (public key) id all
//! come from configuration; the template is expected to use
//! `to_email`, `subject`, `message` and `message_html`.

use serde::Serialize;

use vwatch_core::config::EmailConfig;

use crate::traits::{EmailMessage, EmailTransport, NotifyError};

#[derive(Debug)]
pub struct EmailJsTransport {
    url: String,
    service_id: String,
    template_id: String,
    public_key: String,
    private_key: Option<String>,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: TemplateParams<'a>,
}

#[derive(Serialize)]
struct TemplateParams<'a> {
    to_email: &'a str,
    subject: &'a str,
    message: &'a str,
    message_html: &'a str,
}

impl EmailJsTransport {
    /// Build a transport from configuration.
    ///
    /// Fails with [`NotifyError::Config`] naming the first missing key.
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let require = |value: &Option<String>, key: &str| {
            value
                .clone()
                .ok_or_else(|| NotifyError::Config(format!("{key} is not set")))
        };
        let service_id = require(&config.emailjs_service_id, "EMAILJS_SERVICE_ID")?;
        let template_id = require(&config.emailjs_template_id, "EMAILJS_TEMPLATE_ID")?;
        let public_key = require(&config.emailjs_public_key, "EMAILJS_PUBLIC_KEY")?;

        if config.emailjs_url.is_empty() {
            return Err(NotifyError::Config("EMAILJS_URL is empty".to_string()));
        }

        Ok(Self {
            url: config.emailjs_url.clone(),
            service_id,
            template_id,
            public_key,
            private_key: config.emailjs_private_key.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn request<'a>(&'a self, message: &'a EmailMessage) -> SendRequest<'a> {
        SendRequest {
            service_id: &self.service_id,
            template_id: &self.template_id,
            user_id: &self.public_key,
            access_token: self.private_key.as_deref(),
            template_params: TemplateParams {
                to_email: &message.to,
                subject: &message.subject,
                message: &message.text,
                message_html: &message.html,
            },
        }
    }
}

#[async_trait::async_trait]
impl EmailTransport for EmailJsTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.request(message))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(%status, body = %body, "EmailJS rejected message");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            service = %self.service_id,
            template = %self.template_id,
            %status,
            "EmailJS message accepted"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "emailjs"
    }
}
