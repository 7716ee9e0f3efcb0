// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Federated search across registered adapters.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::Authorizer;
use crate::context::AdminContext;
use crate::descriptor::SEARCH_FILTER;
use crate::error::{AdminError, Result};
use crate::repository::{ListOptions, Repository};

/// Default number of results per adapter.
pub const DEFAULT_LIMIT: usize = 10;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Entity type.
    #[serde(rename = "type")]
    pub result_type: String,
    /// Entity id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Admin URL of the entity.
    pub url: String,
    /// Icon name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Thumbnail URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Source of search results for one entity type.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    /// Return at most `limit` hits for `query`.
    async fn search(&self, ctx: &AdminContext, query: &str, limit: usize)
    -> Result<Vec<SearchResult>>;

    /// Permission token required to see results of this adapter.
    fn permission(&self) -> &str;
}

/// Adapter that runs `_search` against a repository.
pub struct RepositorySearchAdapter {
    result_type: String,
    repository: Arc<dyn Repository>,
    title_field: String,
    description_field: Option<String>,
    url_prefix: String,
    permission: String,
    icon: Option<String>,
}

impl RepositorySearchAdapter {
    /// Search `repository`, titling hits with `title_field`.
    ///
    /// Hit URLs are `<url_prefix>/<id>`.
    pub fn new(
        result_type: impl Into<String>,
        repository: Arc<dyn Repository>,
        title_field: impl Into<String>,
        url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            result_type: result_type.into(),
            repository,
            title_field: title_field.into(),
            description_field: None,
            url_prefix: url_prefix.into(),
            permission: String::new(),
            icon: None,
        }
    }

    /// Use `field` as the hit description.
    pub fn description_field(mut self, field: impl Into<String>) -> Self {
        self.description_field = Some(field.into());
        self
    }

    /// Require a permission token.
    pub fn require_permission(mut self, token: impl Into<String>) -> Self {
        self.permission = token.into();
        self
    }

    /// Set the icon.
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

#[async_trait]
impl SearchAdapter for RepositorySearchAdapter {
    async fn search(
        &self,
        ctx: &AdminContext,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let options = ListOptions {
            page: 1,
            per_page: limit,
            ..ListOptions::default()
        }
        .filter(SEARCH_FILTER, query);
        let page = self.repository.list(ctx, options).await?;
        Ok(page
            .records
            .into_iter()
            .map(|record| SearchResult {
                result_type: self.result_type.clone(),
                title: record
                    .get(&self.title_field)
                    .map(|v| v.to_plain_string())
                    .unwrap_or_else(|| record.id.clone()),
                description: self
                    .description_field
                    .as_ref()
                    .and_then(|f| record.get(f))
                    .map(|v| v.to_plain_string())
                    .unwrap_or_default(),
                url: format!("{}/{}", self.url_prefix, record.id),
                icon: self.icon.clone(),
                thumbnail: None,
                id: record.id,
            })
            .collect())
    }

    fn permission(&self) -> &str {
        &self.permission
    }
}

/// Registered adapters.
///
/// A disabled engine ignores registrations and finds nothing.
pub struct SearchEngine {
    enabled: bool,
    adapters: Vec<(String, Arc<dyn SearchAdapter>)>,
}

impl SearchEngine {
    /// Create an engine.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            adapters: Vec::new(),
        }
    }

    /// Whether search is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register an adapter under a unique key.
    pub fn register(&mut self, key: impl Into<String>, adapter: Arc<dyn SearchAdapter>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let key = key.into();
        if self.adapters.iter().any(|(k, _)| *k == key) {
            return Err(AdminError::DuplicateRegistration {
                registry: "search",
                key,
            });
        }
        self.adapters.push((key, adapter));
        Ok(())
    }

    /// Number of adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapter is registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Query every adapter the user may see.
    ///
    /// Failing adapters are logged and skipped. Results keep adapter
    /// registration order.
    pub async fn search(
        &self,
        ctx: &AdminContext,
        authorizer: &dyn Authorizer,
        query: &str,
        limit: usize,
    ) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };

        let mut allowed = Vec::new();
        for (key, adapter) in &self.adapters {
            let permission = adapter.permission();
            if permission.is_empty() || authorizer.can(ctx, permission, key).await {
                allowed.push((key, adapter));
            }
        }

        let outcomes = join_all(
            allowed
                .iter()
                .map(|(key, adapter)| async move { (*key, adapter.search(ctx, query, limit).await) }),
        )
        .await;

        let mut results = Vec::new();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(hits) => results.extend(hits.into_iter().take(limit)),
                Err(err) => warn!(adapter = %key, error = %err, "Search adapter failed"),
            }
        }
        results
    }
}
