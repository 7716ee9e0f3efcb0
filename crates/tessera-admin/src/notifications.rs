// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-user notification inbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::{AdminContext, Scope};
use crate::error::{AdminError, Result};

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id.
    pub id: String,
    /// Recipient user.
    pub user_id: String,
    /// Recipient scope.
    #[serde(skip)]
    pub scope: Scope,
    /// Title.
    pub title: String,
    /// Body.
    #[serde(default)]
    pub body: String,
    /// Severity (info, success, warning, error).
    pub level: String,
    /// Link into the admin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Whether the user has read it.
    pub read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// In-process notification store.
#[derive(Default)]
pub struct NotificationCenter {
    inbox: RwLock<Vec<Notification>>,
}

impl NotificationCenter {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a notification.
    pub async fn notify(
        &self,
        scope: &Scope,
        user_id: &str,
        level: &str,
        title: &str,
        body: &str,
        link: Option<String>,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            scope: scope.clone(),
            title: title.to_string(),
            body: body.to_string(),
            level: level.to_string(),
            link,
            read: false,
            created_at: Utc::now(),
        };
        self.inbox.write().await.push(notification.clone());
        notification
    }

    /// The caller's notifications, newest first.
    pub async fn list(&self, ctx: &AdminContext) -> Vec<Notification> {
        let inbox = self.inbox.read().await;
        inbox
            .iter()
            .rev()
            .filter(|n| n.user_id == ctx.user_id && n.scope == ctx.scope)
            .cloned()
            .collect()
    }

    /// Number of unread notifications for the caller.
    pub async fn unread_count(&self, ctx: &AdminContext) -> usize {
        self.list(ctx).await.iter().filter(|n| !n.read).count()
    }

    /// Mark one of the caller's notifications as read.
    pub async fn mark_read(&self, ctx: &AdminContext, id: &str) -> Result<Notification> {
        let mut inbox = self.inbox.write().await;
        let notification = inbox
            .iter_mut()
            .find(|n| n.id == id && n.user_id == ctx.user_id && n.scope == ctx.scope)
            .ok_or_else(|| AdminError::not_found("notification", id))?;
        notification.read = true;
        Ok(notification.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(user: &str) -> AdminContext {
        AdminContext {
            user_id: user.to_string(),
            ..AdminContext::default()
        }
    }

    #[tokio::test]
    async fn test_inbox_is_per_user() {
        let center = NotificationCenter::new();
        let scope = Scope::default();
        center.notify(&scope, "u1", "info", "First", "", None).await;
        let second = center
            .notify(&scope, "u1", "warning", "Second", "", None)
            .await;
        center.notify(&scope, "u2", "info", "Other", "", None).await;

        let listed = center.list(&ctx("u1")).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);

        center.mark_read(&ctx("u1"), &second.id).await.unwrap();
        assert_eq!(center.unread_count(&ctx("u1")).await, 1);
        assert!(center.mark_read(&ctx("u2"), &second.id).await.is_err());
    }
}
