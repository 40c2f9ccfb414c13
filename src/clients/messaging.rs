use serde::Serialize;
use thiserror::Error;

use crate::config::MessagingConfig;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },
}

/// Whether a message went out or was skipped because the channel is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct WhatsAppMessage<'a> {
    pub to: &'a str,
    pub body: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EmailMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
    pub html: &'a str,
}

#[derive(Clone)]
pub struct MessagingClient {
    client: reqwest::Client,
    config: MessagingConfig,
}

impl MessagingClient {
    pub fn new(config: MessagingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn email_enabled(&self) -> bool {
        self.config.email_api_url.is_some()
    }

    pub async fn send_whatsapp(&self, to: &str, body: &str) -> Result<Delivery, MessagingError> {
        let Some(base_url) = self.config.whatsapp_api_url.as_deref() else {
            log::debug!("WhatsApp not configured, skipping message");
            return Ok(Delivery::Skipped);
        };

        let url = format!("{}/messages", normalize_base_url(base_url));
        let mut request = self.client.post(&url).json(&WhatsAppMessage { to, body });
        if let Some(token) = &self.config.whatsapp_api_token {
            request = request.bearer_auth(token);
        }

        ensure_success(request.send().await?).await?;
        Ok(Delivery::Sent)
    }

    pub async fn send_email(&self, to: &str, subject: &str, text: &str, html: &str) -> Result<Delivery, MessagingError> {
        let Some(base_url) = self.config.email_api_url.as_deref() else {
            log::debug!("Email not configured, skipping message to {to}");
            return Ok(Delivery::Skipped);
        };

        let url = format!("{}/emails", normalize_base_url(base_url));
        let message = EmailMessage {
            from: &self.config.email_from,
            to,
            subject,
            text,
            html,
        };
        let mut request = self.client.post(&url).json(&message);
        if let Some(key) = &self.config.email_api_key {
            request = request.bearer_auth(key);
        }

        ensure_success(request.send().await?).await?;
        Ok(Delivery::Sent)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), MessagingError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(MessagingError::Status {
        status: status.as_u16(),
        body,
    })
}

fn normalize_base_url(value: &str) -> &str {
    value.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> MessagingClient {
        MessagingClient::new(MessagingConfig {
            whatsapp_api_url: None,
            whatsapp_api_token: None,
            email_api_url: None,
            email_api_key: None,
            email_from: "HappyMeter <reportes@happymeter.app>".into(),
        })
    }

    #[actix_rt::test]
    async fn unconfigured_channels_are_skipped() {
        let client = unconfigured();
        assert!(!client.email_enabled());
        assert_eq!(
            client.send_whatsapp("5215512345678", "hola").await.unwrap(),
            Delivery::Skipped
        );
        assert_eq!(
            client.send_email("owner@restaurante.mx", "Reporte", "texto", "<p>html</p>").await.unwrap(),
            Delivery::Skipped
        );
    }

    #[test]
    fn base_url_trailing_slashes_are_dropped() {
        assert_eq!(normalize_base_url("https://api.example.com/v1/"), "https://api.example.com/v1");
        assert_eq!(normalize_base_url("https://api.example.com"), "https://api.example.com");
    }
}
