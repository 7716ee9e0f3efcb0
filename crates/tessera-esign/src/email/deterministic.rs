// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deterministic email provider.
//!
//! Nothing is delivered. The message id is derived from the input, so the
//! same input always yields the same id.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{EmailInput, EmailProvider, Notification};
use crate::context::JobContext;
use crate::error::Result;

/// A recipient link handed to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLink {
    pub agreement_id: String,
    pub recipient_id: String,
    pub notification: Notification,
    pub correlation_id: String,
    pub sign_url: Option<String>,
    pub completion_url: Option<String>,
}

/// Sees every link the deterministic provider "sends".
pub trait LinkObserver: Send + Sync {
    fn observe(&self, link: &CapturedLink);
}

/// Production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLinkObserver;

impl LinkObserver for NoopLinkObserver {
    fn observe(&self, _link: &CapturedLink) {}
}

/// Keeps every observed link for inspection.
#[derive(Debug, Default)]
pub struct CapturingLinkObserver {
    links: RwLock<Vec<CapturedLink>>,
}

impl CapturingLinkObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&self) -> Vec<CapturedLink> {
        match self.links.read() {
            Ok(links) => links.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Most recent link captured for `recipient_id`.
    pub fn latest_for(&self, recipient_id: &str) -> Option<CapturedLink> {
        self.links()
            .into_iter()
            .rev()
            .find(|link| link.recipient_id == recipient_id)
    }
}

impl LinkObserver for CapturingLinkObserver {
    fn observe(&self, link: &CapturedLink) {
        let mut links = match self.links.write() {
            Ok(links) => links,
            Err(poisoned) => poisoned.into_inner(),
        };
        links.push(link.clone());
    }
}

/// Provider returning `msg_<16 hex>` without any I/O.
pub struct DeterministicProvider {
    observer: Arc<dyn LinkObserver>,
}

impl Default for DeterministicProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicProvider {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopLinkObserver))
    }

    pub fn with_observer(observer: Arc<dyn LinkObserver>) -> Self {
        Self { observer }
    }

    /// Message id for `input`.
    pub fn message_id(input: &EmailInput) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.template_code.as_bytes());
        hasher.update(input.agreement_id.as_bytes());
        hasher.update(input.recipient.id.as_bytes());
        hasher.update(input.recipient.email.as_bytes());
        hasher.update(input.correlation_id.as_bytes());
        hasher.update(input.notification.as_str().as_bytes());
        hasher.update(input.sign_url.as_deref().unwrap_or_default().as_bytes());
        hasher.update(input.completion_url.as_deref().unwrap_or_default().as_bytes());
        let digest = hasher.finalize();
        format!("msg_{}", hex::encode(&digest[..8]))
    }
}

#[async_trait]
impl EmailProvider for DeterministicProvider {
    async fn send(&self, ctx: &JobContext, input: &EmailInput) -> Result<String> {
        ctx.check()?;
        self.observer.observe(&CapturedLink {
            agreement_id: input.agreement_id.clone(),
            recipient_id: input.recipient.id.clone(),
            notification: input.notification,
            correlation_id: input.correlation_id.clone(),
            sign_url: input.sign_url.clone(),
            completion_url: input.completion_url.clone(),
        });
        let id = Self::message_id(input);
        debug!(
            message_id = %id,
            recipient_id = %input.recipient.id,
            template = %input.template_code,
            "Deterministic email accepted"
        );
        Ok(id)
    }
}
