// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SMTP email provider.
//!
//! Sends `multipart/alternative` (plain + HTML). STARTTLS is used when the
//! server offers it unless disabled; AUTH PLAIN when credentials are set.
//! One connection per send.

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::templates::{self, RenderedEmail};
use super::{EmailInput, EmailProvider};
use crate::config::SmtpSettings;
use crate::context::JobContext;
use crate::error::{EsignError, Result};

const SERVICE: &str = "smtp";

pub struct SmtpProvider {
    settings: SmtpSettings,
}

impl SmtpProvider {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    /// `smtp_` + 8 hex chars. The timestamp makes every attempt unique.
    pub fn message_id(input: &EmailInput) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_be_bytes(),
        );
        hasher.update(input.recipient.email.as_bytes());
        hasher.update(input.correlation_id.as_bytes());
        hasher.update(input.template_code.as_bytes());
        let digest = hasher.finalize();
        format!("smtp_{}", hex::encode(&digest[..4]))
    }

    /// Build the MIME message for `input`.
    pub fn build_message(&self, input: &EmailInput, message_id: &str) -> Result<Message> {
        let RenderedEmail {
            subject,
            text,
            html,
        } = templates::render(input);

        let from = Mailbox::new(
            Some(self.settings.from_name.clone()),
            parse_address("from_address", &self.settings.from_address)?,
        );
        let to_name = (!input.recipient.name.is_empty()).then(|| input.recipient.name.clone());
        let to = Mailbox::new(to_name, parse_address("recipient.email", &input.recipient.email)?);

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .message_id(Some(format!("<{}@tessera>", message_id)))
            .multipart(MultiPart::alternative_plain_html(text, html))
            .map_err(|e| EsignError::Validation {
                field: "email".to_string(),
                message: e.to_string(),
            })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let settings = &self.settings;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .timeout(Some(settings.timeout));

        if !settings.disable_starttls {
            let parameters = TlsParameters::builder(settings.host.clone())
                .dangerous_accept_invalid_certs(settings.insecure_tls)
                .build()
                .map_err(|e| EsignError::transient(SERVICE, e.to_string()))?;
            builder = builder.tls(Tls::Opportunistic(parameters));
        }

        if let Some((user, password)) = settings.credentials() {
            builder = builder
                .credentials(Credentials::new(user.to_string(), password.to_string()))
                .authentication(vec![Mechanism::Plain]);
        }

        Ok(builder.build())
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value.parse::<Address>().map_err(|e| EsignError::Validation {
        field: field.to_string(),
        message: format!("'{}' is not a valid address: {}", value, e),
    })
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, ctx: &JobContext, input: &EmailInput) -> Result<String> {
        ctx.check()?;

        let message_id = Self::message_id(input);
        let message = self.build_message(input, &message_id)?;
        let transport = self.transport()?;
        let timeout = self.settings.timeout;

        let result = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => return Err(EsignError::Cancelled),
            result = tokio::time::timeout(timeout, transport.send(message)) => result,
        };

        match result {
            Ok(Ok(_)) => {
                debug!(
                    message_id = %message_id,
                    host = %self.settings.host,
                    recipient_id = %input.recipient.id,
                    "SMTP email sent"
                );
                Ok(message_id)
            }
            Ok(Err(e)) => {
                warn!(host = %self.settings.host, error = %e, "SMTP send failed");
                Err(EsignError::transient(SERVICE, e.to_string()))
            }
            Err(_) => Err(EsignError::transient(
                SERVICE,
                format!("send timed out after {}s", timeout.as_secs()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::Notification;
    use crate::model::Recipient;
    use std::time::Duration;

    fn input() -> EmailInput {
        EmailInput {
            template_code: "esign.signing_request".to_string(),
            notification: Notification::Invitation,
            agreement_id: "a1".to_string(),
            agreement_title: "NDA".to_string(),
            recipient: Recipient::signer("s1", "Sam", "sam@example.com"),
            correlation_id: "corr-1".to_string(),
            sign_url: Some("http://localhost:8082/sign/tok".to_string()),
            completion_url: None,
        }
    }

    fn unreachable() -> SmtpSettings {
        SmtpSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            timeout: Duration::from_secs(2),
            disable_starttls: true,
            ..SmtpSettings::default()
        }
    }

    #[test]
    fn test_message_id_format() {
        let id = SmtpProvider::message_id(&input());
        assert!(id.starts_with("smtp_"));
        assert_eq!(id.len(), "smtp_".len() + 8);
        assert!(id["smtp_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_build_multipart_message() {
        let provider = SmtpProvider::new(SmtpSettings::mailpit());
        let message = provider.build_message(&input(), "smtp_deadbeef").unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("<smtp_deadbeef@tessera>"));
        assert!(raw.contains("Subject: Please sign: NDA"));
    }

    #[test]
    fn test_invalid_recipient_address() {
        let provider = SmtpProvider::new(SmtpSettings::mailpit());
        let mut bad = input();
        bad.recipient.email = "not an address".to_string();

        let err = provider.build_message(&bad, "smtp_00000000").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_connection_failure_is_transient() {
        let provider = SmtpProvider::new(unreachable());
        let ctx = JobContext::for_scope("t1", "o1");

        let err = provider.send(&ctx, &input()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let provider = SmtpProvider::new(unreachable());
        let ctx = JobContext::for_scope("t1", "o1");
        ctx.cancellation().cancel();

        let err = provider.send(&ctx, &input()).await.unwrap_err();
        assert_eq!(err.error_code(), "CANCELLED");
    }
}
