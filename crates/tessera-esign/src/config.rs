// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// Default base URL for sign and completion links.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8082";

/// Default SMTP send timeout.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Which email provider delivers messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmailTransport {
    /// Hash-derived message ids, nothing leaves the process.
    #[default]
    Deterministic,
    /// SMTP relay.
    Smtp,
    /// Local mailpit catcher (SMTP on `localhost:1025`, no STARTTLS).
    Mailpit,
}

impl EmailTransport {
    /// Parse an `ESIGN_EMAIL_TRANSPORT` value. Empty and `mock` select the
    /// deterministic provider.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "deterministic" | "mock" => Some(Self::Deterministic),
            "smtp" => Some(Self::Smtp),
            "mailpit" => Some(Self::Mailpit),
            _ => None,
        }
    }

    pub fn uses_smtp(self) -> bool {
        !matches!(self, Self::Deterministic)
    }
}

/// SMTP connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_name: String,
    pub from_address: String,
    pub timeout: Duration,
    pub disable_starttls: bool,
    pub insecure_tls: bool,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: None,
            password: None,
            from_name: "Tessera E-Sign".to_string(),
            from_address: "no-reply@localhost".to_string(),
            timeout: DEFAULT_SMTP_TIMEOUT,
            disable_starttls: false,
            insecure_tls: false,
        }
    }
}

impl SmtpSettings {
    /// Settings for a local mailpit instance.
    pub fn mailpit() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1025,
            disable_starttls: true,
            ..Self::default()
        }
    }

    /// Credentials, when both user and password are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// E-sign configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsignConfig {
    /// Base URL for generated sign, completion and asset links
    pub public_base_url: String,
    /// Email provider selection
    pub transport: EmailTransport,
    /// SMTP settings, used by the `smtp` and `mailpit` transports
    pub smtp: SmtpSettings,
}

impl Default for EsignConfig {
    fn default() -> Self {
        Self {
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            transport: EmailTransport::Deterministic,
            smtp: SmtpSettings::default(),
        }
    }
}

impl EsignConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `ESIGN_PUBLIC_BASE_URL`: link base (default: `http://localhost:8082`)
    /// - `ESIGN_EMAIL_TRANSPORT`: `deterministic`, `mock`, `smtp` or `mailpit`
    /// - `ESIGN_EMAIL_SMTP_HOST`, `ESIGN_EMAIL_SMTP_PORT`: relay address
    ///   (required host for `smtp`; `mailpit` defaults to `localhost:1025`)
    /// - `ESIGN_EMAIL_SMTP_USERNAME`, `ESIGN_EMAIL_SMTP_PASSWORD`: AUTH PLAIN
    /// - `ESIGN_EMAIL_FROM_NAME`, `ESIGN_EMAIL_FROM_ADDRESS`: sender
    /// - `ESIGN_EMAIL_SMTP_TIMEOUT_SECONDS`: send timeout (default: 10)
    /// - `ESIGN_EMAIL_SMTP_DISABLE_STARTTLS`, `ESIGN_EMAIL_SMTP_INSECURE_TLS`: booleans
    pub fn from_env() -> Result<Self, ConfigError> {
        let public_base_url = non_empty("ESIGN_PUBLIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let transport = match std::env::var("ESIGN_EMAIL_TRANSPORT") {
            Ok(value) => EmailTransport::parse(&value).ok_or(ConfigError::Invalid(
                "ESIGN_EMAIL_TRANSPORT",
                "must be one of deterministic, mock, smtp, mailpit",
            ))?,
            Err(_) => EmailTransport::Deterministic,
        };

        let mut smtp = match transport {
            EmailTransport::Mailpit => SmtpSettings::mailpit(),
            _ => SmtpSettings::default(),
        };

        if let Some(host) = non_empty("ESIGN_EMAIL_SMTP_HOST") {
            smtp.host = host;
        }
        if let Some(port) = non_empty("ESIGN_EMAIL_SMTP_PORT") {
            smtp.port = port.parse().map_err(|_| {
                ConfigError::Invalid("ESIGN_EMAIL_SMTP_PORT", "must be a valid port number")
            })?;
        }
        smtp.username = non_empty("ESIGN_EMAIL_SMTP_USERNAME");
        smtp.password = non_empty("ESIGN_EMAIL_SMTP_PASSWORD");
        if let Some(name) = non_empty("ESIGN_EMAIL_FROM_NAME") {
            smtp.from_name = name;
        }
        if let Some(address) = non_empty("ESIGN_EMAIL_FROM_ADDRESS") {
            smtp.from_address = address;
        }
        if let Some(seconds) = non_empty("ESIGN_EMAIL_SMTP_TIMEOUT_SECONDS") {
            let seconds: u64 = seconds.parse().map_err(|_| {
                ConfigError::Invalid(
                    "ESIGN_EMAIL_SMTP_TIMEOUT_SECONDS",
                    "must be a positive integer",
                )
            })?;
            if seconds > 0 {
                smtp.timeout = Duration::from_secs(seconds);
            }
        }
        if let Some(flag) = non_empty("ESIGN_EMAIL_SMTP_DISABLE_STARTTLS") {
            smtp.disable_starttls = parse_bool("ESIGN_EMAIL_SMTP_DISABLE_STARTTLS", &flag)?;
        }
        if let Some(flag) = non_empty("ESIGN_EMAIL_SMTP_INSECURE_TLS") {
            smtp.insecure_tls = parse_bool("ESIGN_EMAIL_SMTP_INSECURE_TLS", &flag)?;
        }

        if transport == EmailTransport::Smtp && smtp.host.is_empty() {
            return Err(ConfigError::Missing("ESIGN_EMAIL_SMTP_HOST"));
        }

        Ok(Self {
            public_base_url,
            transport,
            smtp,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(key, "must be a boolean")),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
