//! [`Mailer`] implementations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::info;

use crate::application::gateways::{MailError, Mailer, OutgoingEmail};

/// Transactional e-mail over a JSON HTTP API authenticated with a bearer key.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: Url,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MailError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let payload = SendRequest {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.text,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        info!(
            target = "infra::mail",
            to = %email.to,
            subject = %email.subject,
            "mail delivery disabled; message logged only"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_wraps_recipient_in_list() {
        let body = SendRequest {
            from: "site@example.com",
            to: ["owner@example.com"],
            subject: "New message",
            text: "hi",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"][0], "owner@example.com");
        assert_eq!(json["from"], "site@example.com");
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let email = OutgoingEmail {
            to: "a@example.com".into(),
            subject: "s".into(),
            text: "t".into(),
        };
        assert!(LogMailer.send(email).await.is_ok());
    }
}
