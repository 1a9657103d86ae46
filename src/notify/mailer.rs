//! Mailer implementations.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::interfaces::mailer::{Mailer, MailerError, Result};

/// Mailer backed by an HTTP mail relay (transactional mail API).
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: String, token: Option<String>, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            token,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(&RelayMessage {
            from: &self.from,
            to,
            subject,
            html,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailerError::Rejected(format!(
                "relay returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Mailer that only logs. Used when no relay endpoint is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<()> {
        info!(%to, %subject, "mail relay not configured, logging instead");
        Ok(())
    }
}
