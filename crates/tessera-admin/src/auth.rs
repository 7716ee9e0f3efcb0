// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Authentication and authorization seams.
//!
//! Credential verification is out of scope: an [`Authenticator`] only maps
//! request-bound identity information to an [`Identity`]. The
//! [`Authorizer`] is consulted before every panel, command and action
//! invocation.

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::context::{ADMIN_ROLE, AdminContext, Identity, Scope};
use crate::error::Result;

/// Header carrying the user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the role.
pub const ROLE_HEADER: &str = "x-user-role";
/// Header carrying the tenant id.
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Header carrying the organization id.
pub const ORG_HEADER: &str = "x-org-id";
/// Header carrying the preferred locale.
pub const LOCALE_HEADER: &str = "x-locale";

/// Authentication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Where unauthenticated requests are redirected. Empty answers 401.
    /// A path without a leading `/` is resolved under the admin base path.
    pub login_path: String,
}

impl AuthConfig {
    /// Redirect target for anonymous requests, or `None` to answer 401.
    pub fn resolve_login_path(&self, base_path: &str) -> Option<String> {
        let path = self.login_path.trim();
        if path.is_empty() {
            None
        } else if path.starts_with('/') {
            Some(path.to_string())
        } else {
            Some(format!("{}/{}", base_path.trim_end_matches('/'), path))
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "login".to_string(),
        }
    }
}

/// Resolves the identity of a request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Return the identity, or `None` when the request is anonymous.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>>;
}

/// Reads identity from trusted `x-*` headers set by an upstream proxy.
#[derive(Debug, Clone, Default)]
pub struct HeaderAuthenticator;

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Authenticator for HeaderAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>> {
        let Some(user_id) = header(headers, USER_ID_HEADER) else {
            return Ok(None);
        };
        Ok(Some(Identity {
            user_id,
            role: header(headers, ROLE_HEADER).unwrap_or_default(),
            scope: Scope::new(
                header(headers, TENANT_HEADER).unwrap_or_default(),
                header(headers, ORG_HEADER).unwrap_or_default(),
            ),
            locale: header(headers, LOCALE_HEADER),
        }))
    }
}

/// Policy consulted before each invocation.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether `ctx` may perform `action` on `resource`.
    async fn can(&self, ctx: &AdminContext, action: &str, resource: &str) -> bool;

    /// Whether `ctx` may delete records of `resource`. `action` is the
    /// panel's delete token, whatever it is named.
    async fn can_delete(&self, ctx: &AdminContext, action: &str, resource: &str) -> bool {
        self.can(ctx, action, resource).await
    }
}

/// Allows everything except deletes by non-admin roles.
#[derive(Debug, Clone, Default)]
pub struct DefaultAuthorizer;

/// Whether an action token names a delete.
pub fn is_delete_action(action: &str) -> bool {
    action == "delete" || action.ends_with(".delete")
}

#[async_trait]
impl Authorizer for DefaultAuthorizer {
    async fn can(&self, ctx: &AdminContext, action: &str, _resource: &str) -> bool {
        !is_delete_action(action) || ctx.role == ADMIN_ROLE
    }

    async fn can_delete(&self, ctx: &AdminContext, _action: &str, _resource: &str) -> bool {
        ctx.role == ADMIN_ROLE
    }
}
