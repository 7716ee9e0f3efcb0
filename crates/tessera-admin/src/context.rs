// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request scope and identity threaded through every admin call.

use serde::{Deserialize, Serialize};

/// Role name that bypasses the default delete restriction.
pub const ADMIN_ROLE: &str = "admin";

/// Tenant and organization tuple used for multi-tenant isolation.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Tenant identifier (empty for single-tenant hosts).
    pub tenant_id: String,
    /// Organization identifier (empty when unused).
    pub org_id: String,
}

impl Scope {
    /// Create a scope.
    pub fn new(tenant_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            org_id: org_id.into(),
        }
    }
}

/// Identity resolved by an [`Authenticator`](crate::auth::Authenticator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User identifier.
    pub user_id: String,
    /// Role name.
    pub role: String,
    /// Tenant and organization.
    pub scope: Scope,
    /// Preferred locale, if the request carried one.
    pub locale: Option<String>,
}

/// Per-request context handed to providers, handlers and repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminContext {
    /// User identifier.
    pub user_id: String,
    /// Role name.
    pub role: String,
    /// Resolved locale.
    pub locale: String,
    /// Tenant and organization.
    pub scope: Scope,
}

impl AdminContext {
    /// Build a context from an identity, falling back to `default_locale`.
    pub fn from_identity(identity: Identity, default_locale: &str) -> Self {
        Self {
            user_id: identity.user_id,
            role: identity.role,
            locale: identity
                .locale
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| default_locale.to_string()),
            scope: identity.scope,
        }
    }

    /// A system context (used by jobs and tests).
    pub fn system(scope: Scope) -> Self {
        Self {
            user_id: "system".to_string(),
            role: ADMIN_ROLE.to_string(),
            locale: "en".to_string(),
            scope,
        }
    }

    /// Tenant identifier.
    pub fn tenant_id(&self) -> &str {
        &self.scope.tenant_id
    }

    /// Organization identifier.
    pub fn org_id(&self) -> &str {
        &self.scope.org_id
    }

    /// Whether the user holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}
