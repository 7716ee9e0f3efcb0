// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Email delivery.
//!
//! Providers implement [`EmailProvider`]; the job envelope picks one at
//! wiring time:
//!
//! | Provider | Message id |
//! |----------|------------|
//! | [`DeterministicProvider`] | `msg_` + first 8 bytes of a SHA-256 over the input |
//! | [`SmtpProvider`] | `smtp_` + 8 hex chars, unique per attempt |

pub mod deterministic;
pub mod links;
pub mod smtp;
pub mod templates;

pub use self::deterministic::{
    CapturedLink, CapturingLinkObserver, DeterministicProvider, LinkObserver, NoopLinkObserver,
};
pub use self::smtp::SmtpProvider;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EsignConfig;
use crate::context::JobContext;
use crate::error::Result;
use crate::model::Recipient;

/// Which message a recipient receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    #[default]
    Invitation,
    Reminder,
    CompletionPackage,
}

impl Notification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::Reminder => "reminder",
            Self::CompletionPackage => "completion_package",
        }
    }

    /// Template used when the message names none.
    pub fn default_template(self) -> &'static str {
        match self {
            Self::Invitation => "esign.signing_request",
            Self::Reminder => "esign.signing_reminder",
            Self::CompletionPackage => "esign.completed_delivery",
        }
    }
}

/// Everything a provider needs to deliver one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailInput {
    pub template_code: String,
    pub notification: Notification,
    pub agreement_id: String,
    pub agreement_title: String,
    pub recipient: Recipient,
    pub correlation_id: String,
    pub sign_url: Option<String>,
    pub completion_url: Option<String>,
}

impl EmailInput {
    /// The link the recipient acts on.
    pub fn action_url(&self) -> Option<&str> {
        match self.notification {
            Notification::CompletionPackage => self
                .completion_url
                .as_deref()
                .or(self.sign_url.as_deref()),
            _ => self.sign_url.as_deref(),
        }
    }
}

/// Delivers one email and returns the provider message id.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, ctx: &JobContext, input: &EmailInput) -> Result<String>;
}

/// Provider selected by `config.transport`.
pub fn provider_from_config(config: &EsignConfig) -> Arc<dyn EmailProvider> {
    if config.transport.uses_smtp() {
        Arc::new(SmtpProvider::new(config.smtp.clone()))
    } else {
        Arc::new(DeterministicProvider::new())
    }
}
