// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for tessera-esign.
//!
//! Every call takes a [`Scope`]; records of one scope are invisible to
//! another. Two backends are provided:
//!
//! - [`MemoryStore`]: all stores in process memory
//! - [`SqliteStore`]: job runs, email logs and audit events in SQLite

pub mod memory;
pub mod sqlite;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_admin::Scope;

use crate::error::{EsignError, Result};
use crate::model::{
    Agreement, AgreementDraft, AgreementStatus, ArtifactUpdate, AuditEvent, Document, EmailLog,
    JobRun, JobRunSlot, JobRunStart, NewAuditEvent, NewEmailLog,
};

/// Agreements and their lifecycle.
#[async_trait]
pub trait AgreementStore: Send + Sync {
    /// Insert an agreement. Duplicate ids are rejected.
    async fn insert_agreement(&self, scope: &Scope, agreement: Agreement) -> Result<Agreement>;

    async fn get_agreement(&self, scope: &Scope, id: &str) -> Result<Option<Agreement>>;

    async fn list_agreements(&self, scope: &Scope) -> Result<Vec<Agreement>>;

    /// Apply draft edits. Fails with `AGREEMENT_IMMUTABLE` once completed.
    async fn update_draft(
        &self,
        scope: &Scope,
        id: &str,
        draft: AgreementDraft,
    ) -> Result<Agreement>;

    /// Move along `draft → sent → completed`.
    async fn transition(
        &self,
        scope: &Scope,
        id: &str,
        next: AgreementStatus,
    ) -> Result<Agreement>;

    /// Record a PDF artifact. Allowed on completed agreements.
    async fn set_artifact(&self, scope: &Scope, id: &str, update: ArtifactUpdate)
    -> Result<Agreement>;

    /// Delete a non-completed agreement.
    async fn delete_agreement(&self, scope: &Scope, id: &str) -> Result<()>;

    /// Load an agreement or fail with `NOT_FOUND`.
    async fn require_agreement(&self, scope: &Scope, id: &str) -> Result<Agreement> {
        self.get_agreement(scope, id)
            .await?
            .ok_or_else(|| EsignError::not_found("agreement", id))
    }
}

/// Deduplicated job run records.
#[async_trait]
pub trait JobRunStore: Send + Sync {
    /// Atomically acquire the dedupe slot for `(scope, job_name, dedupe_key)`.
    ///
    /// - no prior run: insert as `running`, attempt 1, `should_run = true`
    /// - prior `succeeded`, `running` or `queued`: `should_run = false`
    /// - prior `failed` or `retrying`: bump `attempt_count`, clear
    ///   `last_error`, `should_run = true`
    async fn begin_job_run(&self, scope: &Scope, start: JobRunStart) -> Result<JobRunSlot>;

    async fn mark_job_run_succeeded(&self, scope: &Scope, id: &str) -> Result<JobRun>;

    /// Record a failure: `retrying` when `next_retry_at` is set, `failed`
    /// otherwise.
    async fn mark_job_run_failed(
        &self,
        scope: &Scope,
        id: &str,
        last_error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobRun>;

    async fn get_job_run(&self, scope: &Scope, id: &str) -> Result<Option<JobRun>>;

    async fn find_job_run(
        &self,
        scope: &Scope,
        job_name: &str,
        dedupe_key: &str,
    ) -> Result<Option<JobRun>>;

    /// Runs of the scope, most recently updated first.
    async fn list_job_runs(&self, scope: &Scope, job_name: Option<&str>) -> Result<Vec<JobRun>>;
}

/// Email delivery records.
#[async_trait]
pub trait EmailLogStore: Send + Sync {
    /// Create a `queued` log.
    async fn create_email_log(&self, scope: &Scope, log: NewEmailLog) -> Result<EmailLog>;

    async fn find_email_log_by_run(&self, scope: &Scope, job_run_id: &str)
    -> Result<Option<EmailLog>>;

    /// Persist every mutable field of `log`.
    async fn save_email_log(&self, scope: &Scope, log: &EmailLog) -> Result<()>;

    async fn list_email_logs(&self, scope: &Scope, agreement_id: &str) -> Result<Vec<EmailLog>>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_audit_event(&self, scope: &Scope, event: NewAuditEvent) -> Result<AuditEvent>;

    /// Events in insertion order, optionally for one agreement.
    async fn list_audit_events(
        &self,
        scope: &Scope,
        agreement_id: Option<&str>,
    ) -> Result<Vec<AuditEvent>>;

    /// Always fails with `AUDIT_EVENTS_APPEND_ONLY`.
    async fn update_audit_event(
        &self,
        scope: &Scope,
        id: &str,
        metadata: serde_json::Value,
    ) -> Result<AuditEvent>;

    /// Always fails with `AUDIT_EVENTS_APPEND_ONLY`.
    async fn delete_audit_event(&self, scope: &Scope, id: &str) -> Result<()>;
}

/// Imported documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, scope: &Scope, document: Document) -> Result<Document>;

    async fn list_documents(&self, scope: &Scope) -> Result<Vec<Document>>;
}

/// The store collaborators the job orchestrator needs.
#[derive(Clone)]
pub struct Stores {
    pub agreements: Arc<dyn AgreementStore>,
    pub job_runs: Arc<dyn JobRunStore>,
    pub email_logs: Arc<dyn EmailLogStore>,
    pub audit: Arc<dyn AuditStore>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Stores {
    /// Everything in memory.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            agreements: store.clone(),
            job_runs: store.clone(),
            email_logs: store.clone(),
            audit: store.clone(),
            documents: store,
        }
    }

    /// Job runs, email logs and audit events in SQLite; agreements and
    /// documents in memory.
    pub fn sqlite(sqlite: SqliteStore) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let sqlite = Arc::new(sqlite);
        Self {
            agreements: memory.clone(),
            job_runs: sqlite.clone(),
            email_logs: sqlite.clone(),
            audit: sqlite,
            documents: memory,
        }
    }
}
