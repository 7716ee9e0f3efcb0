// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Repository contract consumed by panels, search and commands.
//!
//! Storage engines stay opaque: a panel only sees the five operations of
//! [`Repository`]. [`MemoryRepository`] is the in-process implementation used
//! by the demo applications and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::context::{AdminContext, Scope};
use crate::descriptor::SEARCH_FILTER;
use crate::error::{AdminError, Result};
use crate::record::{Record, Value};

/// Default page size.
pub const DEFAULT_PER_PAGE: usize = 20;

/// Largest accepted page size.
pub const MAX_PER_PAGE: usize = 200;

/// List request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// 1-based page number.
    pub page: usize,
    /// Items per page.
    pub per_page: usize,
    /// Filters by name. `_search` is a full-text match.
    pub filters: BTreeMap<String, String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            filters: BTreeMap::new(),
        }
    }
}

impl ListOptions {
    /// Clamp page and page size into their accepted ranges.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.per_page = match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n => n.min(MAX_PER_PAGE),
        };
        self
    }

    /// Builder-style filter.
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    /// Full-text search term, if present and non-empty.
    pub fn search_term(&self) -> Option<&str> {
        self.filters
            .get(SEARCH_FILTER)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Zero-based offset of the first item.
    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1).saturating_mul(self.per_page)
    }
}

/// One page of records plus the unpaginated total.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListResult {
    /// Records on this page.
    pub records: Vec<Record>,
    /// Number of records matching the filters.
    pub total: usize,
}

/// Uniform CRUD contract.
#[async_trait]
pub trait Repository: Send + Sync {
    /// List records.
    async fn list(&self, ctx: &AdminContext, options: ListOptions) -> Result<ListResult>;

    /// Fetch one record. Missing ids fail with `NOT_FOUND`.
    async fn get(&self, ctx: &AdminContext, id: &str) -> Result<Record>;

    /// Insert a record and return it with its id.
    async fn create(&self, ctx: &AdminContext, record: Record) -> Result<Record>;

    /// Apply a partial update.
    async fn update(&self, ctx: &AdminContext, id: &str, patch: Record) -> Result<Record>;

    /// Delete a record.
    async fn delete(&self, ctx: &AdminContext, id: &str) -> Result<()>;
}

/// Thread-safe in-memory repository, partitioned by [`Scope`].
///
/// Records created under one tenant/org are invisible from another.
pub struct MemoryRepository {
    entity: String,
    next_id: AtomicU64,
    records: RwLock<BTreeMap<Scope, Vec<Record>>>,
}

impl MemoryRepository {
    /// Create an empty repository. `entity` names records in errors.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            next_id: AtomicU64::new(1),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert fixtures under `scope`. Records without an id get one.
    pub async fn seed(&self, scope: &Scope, records: impl IntoIterator<Item = Record>) {
        let mut guard = self.records.write().await;
        let bucket = guard.entry(scope.clone()).or_default();
        for mut record in records {
            if record.id.is_empty() {
                record.id = self.allocate_id();
            }
            bucket.push(record);
        }
    }

    fn allocate_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }
}

fn matches_filters(record: &Record, options: &ListOptions) -> bool {
    if let Some(term) = options.search_term() {
        let needle = term.to_lowercase();
        if !record.values.values().any(|v| v.contains_text(&needle)) {
            return false;
        }
    }
    options
        .filters
        .iter()
        .filter(|(name, value)| name.as_str() != SEARCH_FILTER && !value.is_empty())
        .all(|(name, expected)| {
            if name == "id" {
                return &record.id == expected;
            }
            record
                .get(name)
                .is_some_and(|v| v.to_plain_string() == *expected)
        })
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list(&self, ctx: &AdminContext, options: ListOptions) -> Result<ListResult> {
        let options = options.normalized();
        let guard = self.records.read().await;
        let matching: Vec<&Record> = guard
            .get(&ctx.scope)
            .map(|bucket| bucket.iter().filter(|r| matches_filters(r, &options)).collect())
            .unwrap_or_default();

        let total = matching.len();
        let records = matching
            .into_iter()
            .skip(options.offset())
            .take(options.per_page)
            .cloned()
            .collect();
        Ok(ListResult { records, total })
    }

    async fn get(&self, ctx: &AdminContext, id: &str) -> Result<Record> {
        let guard = self.records.read().await;
        guard
            .get(&ctx.scope)
            .and_then(|bucket| bucket.iter().find(|r| r.id == id))
            .cloned()
            .ok_or_else(|| AdminError::not_found(&self.entity, id))
    }

    async fn create(&self, ctx: &AdminContext, mut record: Record) -> Result<Record> {
        record.id = self.allocate_id();
        let mut guard = self.records.write().await;
        guard.entry(ctx.scope.clone()).or_default().push(record.clone());
        Ok(record)
    }

    async fn update(&self, ctx: &AdminContext, id: &str, patch: Record) -> Result<Record> {
        let mut guard = self.records.write().await;
        let record = guard
            .get_mut(&ctx.scope)
            .and_then(|bucket| bucket.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| AdminError::not_found(&self.entity, id))?;
        record.merge(patch);
        Ok(record.clone())
    }

    async fn delete(&self, ctx: &AdminContext, id: &str) -> Result<()> {
        let mut guard = self.records.write().await;
        let bucket = guard
            .get_mut(&ctx.scope)
            .ok_or_else(|| AdminError::not_found(&self.entity, id))?;
        let before = bucket.len();
        bucket.retain(|r| r.id != id);
        if bucket.len() == before {
            return Err(AdminError::not_found(&self.entity, id));
        }
        Ok(())
    }
}

/// Read a numeric cell as i64, treating absent or non-numeric cells as zero.
pub fn int_cell(record: &Record, key: &str) -> i64 {
    record.get(key).and_then(Value::as_i64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(tenant: &str) -> AdminContext {
        AdminContext::system(Scope::new(tenant, "org"))
    }

    async fn seeded() -> MemoryRepository {
        let repo = MemoryRepository::new("product");
        let scope = Scope::new("t1", "org");
        repo.seed(
            &scope,
            (0..25).map(|i| {
                Record::new()
                    .with("name", format!("Item {}", i))
                    .with("status", if i % 2 == 0 { "active" } else { "draft" })
            }),
        )
        .await;
        repo.seed(&scope, [Record::new().with("name", "Winter Hoodie")])
            .await;
        repo
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let repo = seeded().await;
        let page = repo
            .list(
                &ctx("t1"),
                ListOptions {
                    page: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 26);
        assert_eq!(page.records.len(), 6);
    }

    #[tokio::test]
    async fn test_huge_page_is_past_the_end() {
        let repo = seeded().await;
        let options = ListOptions {
            page: usize::MAX,
            ..Default::default()
        };
        assert_eq!(options.offset(), usize::MAX);

        let page = repo.list(&ctx("t1"), options).await.unwrap();
        assert_eq!(page.total, 26);
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let repo = seeded().await;
        let result = repo
            .list(&ctx("t1"), ListOptions::default().filter("_search", "HOODIE"))
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.records[0].get_str("name"), Some("Winter Hoodie"));
    }

    #[tokio::test]
    async fn test_equality_filter() {
        let repo = seeded().await;
        let result = repo
            .list(&ctx("t1"), ListOptions::default().filter("status", "draft"))
            .await
            .unwrap();
        assert_eq!(result.total, 12);
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let repo = seeded().await;
        let other = repo.list(&ctx("t2"), ListOptions::default()).await.unwrap();
        assert_eq!(other.total, 0);
        let err = repo.get(&ctx("t2"), "1").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_crud_cycle() {
        let repo = MemoryRepository::new("product");
        let ctx = ctx("t1");
        let created = repo
            .create(&ctx, Record::new().with("name", "Mug").with("inventory", 4i64))
            .await
            .unwrap();
        assert!(!created.id.is_empty());

        let updated = repo
            .update(&ctx, &created.id, Record::new().with("inventory", 9i64))
            .await
            .unwrap();
        assert_eq!(int_cell(&updated, "inventory"), 9);
        assert_eq!(updated.get_str("name"), Some("Mug"));

        repo.delete(&ctx, &created.id).await.unwrap();
        assert!(repo.delete(&ctx, &created.id).await.is_err());
    }

    #[test]
    fn test_per_page_is_clamped() {
        let options = ListOptions {
            page: 0,
            per_page: 5000,
            filters: BTreeMap::new(),
        }
        .normalized();
        assert_eq!(options.page, 1);
        assert_eq!(options.per_page, MAX_PER_PAGE);
    }
}
