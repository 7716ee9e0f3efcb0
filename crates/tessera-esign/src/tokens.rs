// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recipient-scoped link tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tessera_admin::Scope;
use uuid::Uuid;

use crate::context::JobContext;
use crate::error::Result;

/// What a token grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    #[default]
    Sign,
    Completion,
    Asset,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Completion => "completion",
            Self::Asset => "asset",
        }
    }
}

/// What a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    pub agreement_id: String,
    pub recipient_id: String,
    pub purpose: TokenPurpose,
    #[serde(skip)]
    pub scope: Scope,
    pub issued_at: DateTime<Utc>,
}

/// Issues and validates recipient tokens.
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Issue a token bound to `recipient_id`.
    async fn issue(
        &self,
        ctx: &JobContext,
        agreement_id: &str,
        recipient_id: &str,
        purpose: TokenPurpose,
    ) -> Result<String>;

    /// Resolve a token issued in the caller's scope.
    async fn validate(&self, ctx: &JobContext, token: &str) -> Result<Option<TokenClaims>>;

    /// Issue a replacement and revoke earlier tokens with the same binding.
    /// Earlier tokens stay valid if issuing fails.
    async fn rotate(
        &self,
        ctx: &JobContext,
        agreement_id: &str,
        recipient_id: &str,
        purpose: TokenPurpose,
    ) -> Result<String>;
}

/// Token service keeping SHA-256 digests in memory. Raw tokens are never
/// stored.
#[derive(Debug, Default)]
pub struct InMemoryTokenService {
    tokens: DashMap<String, TokenClaims>,
}

impl InMemoryTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn store(
        &self,
        scope: &Scope,
        agreement_id: &str,
        recipient_id: &str,
        purpose: TokenPurpose,
    ) -> (String, String) {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let digest = digest(&token);
        self.tokens.insert(
            digest.clone(),
            TokenClaims {
                agreement_id: agreement_id.to_string(),
                recipient_id: recipient_id.to_string(),
                purpose,
                scope: scope.clone(),
                issued_at: Utc::now(),
            },
        );
        (token, digest)
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait]
impl TokenService for InMemoryTokenService {
    async fn issue(
        &self,
        ctx: &JobContext,
        agreement_id: &str,
        recipient_id: &str,
        purpose: TokenPurpose,
    ) -> Result<String> {
        ctx.check()?;
        let (token, _) = self.store(&ctx.scope, agreement_id, recipient_id, purpose);
        Ok(token)
    }

    async fn validate(&self, ctx: &JobContext, token: &str) -> Result<Option<TokenClaims>> {
        Ok(self
            .tokens
            .get(&digest(token))
            .filter(|claims| claims.scope == ctx.scope)
            .map(|claims| claims.clone()))
    }

    async fn rotate(
        &self,
        ctx: &JobContext,
        agreement_id: &str,
        recipient_id: &str,
        purpose: TokenPurpose,
    ) -> Result<String> {
        ctx.check()?;
        let (token, keep) = self.store(&ctx.scope, agreement_id, recipient_id, purpose);
        self.tokens.retain(|digest, claims| {
            digest == &keep
                || claims.scope != ctx.scope
                || claims.agreement_id != agreement_id
                || claims.recipient_id != recipient_id
                || claims.purpose != purpose
        });
        Ok(token)
    }
}
