// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed job run, email log and audit stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tessera_admin::Scope;
use uuid::Uuid;

use crate::error::{EsignError, Result};
use crate::migrations;
use crate::model::{
    AuditEvent, EmailLog, EmailLogStatus, JobRun, JobRunSlot, JobRunStart, JobRunStatus,
    NewAuditEvent, NewEmailLog,
};

use super::{AuditStore, EmailLogStore, JobRunStore};

/// SQLite-backed store. The pool is owned by the host; the store never
/// closes it.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and apply the schema.
    ///
    /// In-memory databases are limited to one connection so every query
    /// sees the same database.
    pub async fn connect(url: &str) -> Result<Self> {
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| EsignError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", url, e),
            })?;

        migrations::run_sqlite(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct JobRunRow {
    id: String,
    job_name: String,
    dedupe_key: String,
    agreement_id: Option<String>,
    recipient_id: Option<String>,
    correlation_id: String,
    status: String,
    attempt_count: i64,
    max_attempts: i64,
    last_error: Option<String>,
    next_retry_at: Option<DateTime<Utc>>,
    attempted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRunRow> for JobRun {
    type Error = EsignError;

    fn try_from(row: JobRunRow) -> Result<Self> {
        let status = JobRunStatus::parse(&row.status).ok_or_else(|| EsignError::Database {
            operation: "decode job run".to_string(),
            details: format!("unknown status '{}'", row.status),
        })?;
        Ok(JobRun {
            id: row.id,
            job_name: row.job_name,
            dedupe_key: row.dedupe_key,
            agreement_id: row.agreement_id,
            recipient_id: row.recipient_id,
            correlation_id: row.correlation_id,
            status,
            attempt_count: count(row.attempt_count),
            max_attempts: count(row.max_attempts),
            last_error: row.last_error,
            next_retry_at: row.next_retry_at,
            attempted_at: row.attempted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EmailLogRow {
    id: String,
    job_run_id: String,
    agreement_id: String,
    recipient_id: String,
    template_code: String,
    status: String,
    provider_message_id: Option<String>,
    attempt_count: i64,
    max_attempts: i64,
    correlation_id: String,
    failure_reason: Option<String>,
    next_retry_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EmailLogRow> for EmailLog {
    type Error = EsignError;

    fn try_from(row: EmailLogRow) -> Result<Self> {
        let status = EmailLogStatus::parse(&row.status).ok_or_else(|| EsignError::Database {
            operation: "decode email log".to_string(),
            details: format!("unknown status '{}'", row.status),
        })?;
        Ok(EmailLog {
            id: row.id,
            job_run_id: row.job_run_id,
            agreement_id: row.agreement_id,
            recipient_id: row.recipient_id,
            template_code: row.template_code,
            status,
            provider_message_id: row.provider_message_id,
            attempt_count: count(row.attempt_count),
            max_attempts: count(row.max_attempts),
            correlation_id: row.correlation_id,
            failure_reason: row.failure_reason,
            next_retry_at: row.next_retry_at,
            sent_at: row.sent_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: String,
    agreement_id: Option<String>,
    event_type: String,
    actor_type: String,
    metadata_json: String,
    created_at: DateTime<Utc>,
}

impl From<AuditEventRow> for AuditEvent {
    fn from(row: AuditEventRow) -> Self {
        AuditEvent {
            id: row.id,
            agreement_id: row.agreement_id,
            event_type: row.event_type,
            actor_type: row.actor_type,
            metadata_json: row.metadata_json,
            created_at: row.created_at,
        }
    }
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

const JOB_RUN_COLUMNS: &str = "id, job_name, dedupe_key, agreement_id, recipient_id, \
     correlation_id, status, attempt_count, max_attempts, last_error, next_retry_at, \
     attempted_at, created_at, updated_at";

const EMAIL_LOG_COLUMNS: &str = "id, job_run_id, agreement_id, recipient_id, template_code, \
     status, provider_message_id, attempt_count, max_attempts, correlation_id, failure_reason, \
     next_retry_at, sent_at, created_at, updated_at";

#[async_trait]
impl JobRunStore for SqliteStore {
    async fn begin_job_run(&self, scope: &Scope, start: JobRunStart) -> Result<JobRunSlot> {
        let now = Utc::now();
        // Take the write lock up front; concurrent callers wait on the busy timeout.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        // The unique dedupe index makes the insert the slot acquisition.
        let inserted = sqlx::query(
            r#"
            INSERT INTO esign_job_runs (
                id, tenant_id, org_id, job_name, dedupe_key, agreement_id, recipient_id,
                correlation_id, status, attempt_count, max_attempts, attempted_at,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'running', 1, ?, ?, ?, ?)
            ON CONFLICT (tenant_id, org_id, job_name, dedupe_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(&start.job_name)
        .bind(&start.dedupe_key)
        .bind(&start.agreement_id)
        .bind(&start.recipient_id)
        .bind(&start.correlation_id)
        .bind(i64::from(start.max_attempts))
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        let select = format!(
            "SELECT {} FROM esign_job_runs \
             WHERE tenant_id = ? AND org_id = ? AND job_name = ? AND dedupe_key = ?",
            JOB_RUN_COLUMNS
        );
        let row: JobRunRow = sqlx::query_as(&select)
            .bind(&scope.tenant_id)
            .bind(&scope.org_id)
            .bind(&start.job_name)
            .bind(&start.dedupe_key)
            .fetch_one(&mut *tx)
            .await?;
        let mut run = JobRun::try_from(row)?;

        let should_run = if inserted {
            true
        } else if run.status.can_retry() {
            sqlx::query(
                r#"
                UPDATE esign_job_runs
                SET status = 'running',
                    attempt_count = attempt_count + 1,
                    max_attempts = ?,
                    last_error = NULL,
                    next_retry_at = NULL,
                    attempted_at = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(i64::from(start.max_attempts))
            .bind(now)
            .bind(now)
            .bind(&run.id)
            .execute(&mut *tx)
            .await?;

            run.status = JobRunStatus::Running;
            run.attempt_count += 1;
            run.max_attempts = start.max_attempts;
            run.last_error = None;
            run.next_retry_at = None;
            run.attempted_at = Some(now);
            run.updated_at = now;
            true
        } else {
            false
        };

        tx.commit().await?;

        Ok(JobRunSlot { run, should_run })
    }

    async fn mark_job_run_succeeded(&self, scope: &Scope, id: &str) -> Result<JobRun> {
        let result = sqlx::query(
            r#"
            UPDATE esign_job_runs
            SET status = 'succeeded', last_error = NULL, next_retry_at = NULL, updated_at = ?
            WHERE tenant_id = ? AND org_id = ? AND id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EsignError::not_found("job run", id));
        }
        self.get_job_run(scope, id)
            .await?
            .ok_or_else(|| EsignError::not_found("job run", id))
    }

    async fn mark_job_run_failed(
        &self,
        scope: &Scope,
        id: &str,
        last_error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobRun> {
        let status = if next_retry_at.is_some() {
            JobRunStatus::Retrying
        } else {
            JobRunStatus::Failed
        };
        let result = sqlx::query(
            r#"
            UPDATE esign_job_runs
            SET status = ?, last_error = ?, next_retry_at = ?, updated_at = ?
            WHERE tenant_id = ? AND org_id = ? AND id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(last_error)
        .bind(next_retry_at)
        .bind(Utc::now())
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EsignError::not_found("job run", id));
        }
        self.get_job_run(scope, id)
            .await?
            .ok_or_else(|| EsignError::not_found("job run", id))
    }

    async fn get_job_run(&self, scope: &Scope, id: &str) -> Result<Option<JobRun>> {
        let select = format!(
            "SELECT {} FROM esign_job_runs WHERE tenant_id = ? AND org_id = ? AND id = ?",
            JOB_RUN_COLUMNS
        );
        let row: Option<JobRunRow> = sqlx::query_as(&select)
            .bind(&scope.tenant_id)
            .bind(&scope.org_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRun::try_from).transpose()
    }

    async fn find_job_run(
        &self,
        scope: &Scope,
        job_name: &str,
        dedupe_key: &str,
    ) -> Result<Option<JobRun>> {
        let select = format!(
            "SELECT {} FROM esign_job_runs \
             WHERE tenant_id = ? AND org_id = ? AND job_name = ? AND dedupe_key = ?",
            JOB_RUN_COLUMNS
        );
        let row: Option<JobRunRow> = sqlx::query_as(&select)
            .bind(&scope.tenant_id)
            .bind(&scope.org_id)
            .bind(job_name)
            .bind(dedupe_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRun::try_from).transpose()
    }

    async fn list_job_runs(&self, scope: &Scope, job_name: Option<&str>) -> Result<Vec<JobRun>> {
        let select = format!(
            "SELECT {} FROM esign_job_runs \
             WHERE tenant_id = ? AND org_id = ? AND (? IS NULL OR job_name = ?) \
             ORDER BY updated_at DESC, id",
            JOB_RUN_COLUMNS
        );
        let rows: Vec<JobRunRow> = sqlx::query_as(&select)
            .bind(&scope.tenant_id)
            .bind(&scope.org_id)
            .bind(job_name)
            .bind(job_name)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(JobRun::try_from).collect()
    }
}

#[async_trait]
impl EmailLogStore for SqliteStore {
    async fn create_email_log(&self, scope: &Scope, log: NewEmailLog) -> Result<EmailLog> {
        let now = Utc::now();
        let created = EmailLog {
            id: Uuid::new_v4().to_string(),
            job_run_id: log.job_run_id,
            agreement_id: log.agreement_id,
            recipient_id: log.recipient_id,
            template_code: log.template_code,
            status: EmailLogStatus::Queued,
            provider_message_id: None,
            attempt_count: 0,
            max_attempts: log.max_attempts,
            correlation_id: log.correlation_id,
            failure_reason: None,
            next_retry_at: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO esign_email_logs (
                id, tenant_id, org_id, job_run_id, agreement_id, recipient_id, template_code,
                status, attempt_count, max_attempts, correlation_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 'queued', 0, ?, ?, ?, ?)
            "#,
        )
        .bind(&created.id)
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(&created.job_run_id)
        .bind(&created.agreement_id)
        .bind(&created.recipient_id)
        .bind(&created.template_code)
        .bind(i64::from(created.max_attempts))
        .bind(&created.correlation_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_email_log_by_run(
        &self,
        scope: &Scope,
        job_run_id: &str,
    ) -> Result<Option<EmailLog>> {
        let select = format!(
            "SELECT {} FROM esign_email_logs \
             WHERE tenant_id = ? AND org_id = ? AND job_run_id = ?",
            EMAIL_LOG_COLUMNS
        );
        let row: Option<EmailLogRow> = sqlx::query_as(&select)
            .bind(&scope.tenant_id)
            .bind(&scope.org_id)
            .bind(job_run_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(EmailLog::try_from).transpose()
    }

    async fn save_email_log(&self, scope: &Scope, log: &EmailLog) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE esign_email_logs
            SET status = ?, provider_message_id = ?, attempt_count = ?, max_attempts = ?,
                failure_reason = ?, next_retry_at = ?, sent_at = ?, updated_at = ?
            WHERE tenant_id = ? AND org_id = ? AND id = ?
            "#,
        )
        .bind(log.status.as_str())
        .bind(&log.provider_message_id)
        .bind(i64::from(log.attempt_count))
        .bind(i64::from(log.max_attempts))
        .bind(&log.failure_reason)
        .bind(log.next_retry_at)
        .bind(log.sent_at)
        .bind(Utc::now())
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(&log.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EsignError::not_found("email log", &log.id));
        }
        Ok(())
    }

    async fn list_email_logs(&self, scope: &Scope, agreement_id: &str) -> Result<Vec<EmailLog>> {
        let select = format!(
            "SELECT {} FROM esign_email_logs \
             WHERE tenant_id = ? AND org_id = ? AND agreement_id = ? \
             ORDER BY created_at, id",
            EMAIL_LOG_COLUMNS
        );
        let rows: Vec<EmailLogRow> = sqlx::query_as(&select)
            .bind(&scope.tenant_id)
            .bind(&scope.org_id)
            .bind(agreement_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(EmailLog::try_from).collect()
    }
}

#[async_trait]
impl AuditStore for SqliteStore {
    async fn append_audit_event(&self, scope: &Scope, event: NewAuditEvent) -> Result<AuditEvent> {
        let created = AuditEvent {
            id: Uuid::new_v4().to_string(),
            agreement_id: event.agreement_id,
            event_type: event.event_type,
            actor_type: event.actor_type,
            metadata_json: event.metadata.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO esign_audit_events (
                id, tenant_id, org_id, agreement_id, event_type, actor_type, metadata_json,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&created.id)
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(&created.agreement_id)
        .bind(&created.event_type)
        .bind(&created.actor_type)
        .bind(&created.metadata_json)
        .bind(created.created_at)
        .execute(&self.pool)
        .await?;

        Ok(created)
    }

    async fn list_audit_events(
        &self,
        scope: &Scope,
        agreement_id: Option<&str>,
    ) -> Result<Vec<AuditEvent>> {
        let rows: Vec<AuditEventRow> = sqlx::query_as(
            r#"
            SELECT id, agreement_id, event_type, actor_type, metadata_json, created_at
            FROM esign_audit_events
            WHERE tenant_id = ? AND org_id = ? AND (? IS NULL OR agreement_id = ?)
            ORDER BY seq
            "#,
        )
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(agreement_id)
        .bind(agreement_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditEvent::from).collect())
    }

    async fn update_audit_event(
        &self,
        scope: &Scope,
        id: &str,
        metadata: serde_json::Value,
    ) -> Result<AuditEvent> {
        // The schema triggers reject the statement.
        sqlx::query(
            r#"
            UPDATE esign_audit_events SET metadata_json = ?
            WHERE tenant_id = ? AND org_id = ? AND id = ?
            "#,
        )
        .bind(metadata.to_string())
        .bind(&scope.tenant_id)
        .bind(&scope.org_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Err(EsignError::AuditEventsAppendOnly)
    }

    async fn delete_audit_event(&self, scope: &Scope, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM esign_audit_events WHERE tenant_id = ? AND org_id = ? AND id = ?")
            .bind(&scope.tenant_id)
            .bind(&scope.org_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Err(EsignError::AuditEventsAppendOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create an in-memory store for testing.
    async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        migrations::run_sqlite(&pool)
            .await
            .expect("Failed to run migrations");

        SqliteStore::new(pool)
    }

    fn scope() -> Scope {
        Scope::new("tenant-1", "org-1")
    }

    fn start(dedupe_key: &str, max_attempts: u32) -> JobRunStart {
        JobRunStart {
            job_name: "pdf_render_pages".to_string(),
            dedupe_key: dedupe_key.to_string(),
            agreement_id: Some("a1".to_string()),
            recipient_id: None,
            correlation_id: "corr-1".to_string(),
            max_attempts,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_begin_job_run_on_file_grants_one_slot() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("runs.db").display());
        let store = SqliteStore::connect(&url).await.unwrap();

        let scope = scope();
        let slots = futures::future::join_all(
            (0..8).map(|_| store.begin_job_run(&scope, start("k1", 3))),
        )
        .await;

        let slots: Vec<JobRunSlot> = slots.into_iter().map(|slot| slot.unwrap()).collect();
        assert_eq!(slots.iter().filter(|slot| slot.should_run).count(), 1);
        assert!(slots.iter().all(|slot| slot.run.id == slots[0].run.id));

        let runs = store.list_job_runs(&scope, None).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].attempt_count, 1);
    }

    #[tokio::test]
    async fn test_begin_job_run_inserts_once() {
        let store = test_store().await;

        let first = store.begin_job_run(&scope(), start("k1", 3)).await.unwrap();
        assert!(first.should_run);
        assert_eq!(first.run.status, JobRunStatus::Running);
        assert_eq!(first.run.attempt_count, 1);

        // Still running: a concurrent attempt does not get the slot.
        let second = store.begin_job_run(&scope(), start("k1", 3)).await.unwrap();
        assert!(!second.should_run);
        assert_eq!(second.run.id, first.run.id);

        let runs = store.list_job_runs(&scope(), None).await.unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn test_begin_job_run_after_failure_and_success() {
        let store = test_store().await;

        let slot = store.begin_job_run(&scope(), start("k1", 3)).await.unwrap();
        let retrying = store
            .mark_job_run_failed(&scope(), &slot.run.id, "render timeout", Some(Utc::now()))
            .await
            .unwrap();
        assert_eq!(retrying.status, JobRunStatus::Retrying);
        assert!(retrying.next_retry_at.is_some());

        let retry = store.begin_job_run(&scope(), start("k1", 3)).await.unwrap();
        assert!(retry.should_run);
        assert_eq!(retry.run.attempt_count, 2);
        assert_eq!(retry.run.last_error, None);

        let done = store
            .mark_job_run_succeeded(&scope(), &retry.run.id)
            .await
            .unwrap();
        assert_eq!(done.status, JobRunStatus::Succeeded);

        let replay = store.begin_job_run(&scope(), start("k1", 3)).await.unwrap();
        assert!(!replay.should_run);
        assert_eq!(replay.run.attempt_count, 2);
    }

    #[tokio::test]
    async fn test_mark_unknown_run() {
        let store = test_store().await;
        let err = store
            .mark_job_run_succeeded(&scope(), "missing")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_dedupe_is_per_scope() {
        let store = test_store().await;

        store.begin_job_run(&scope(), start("k1", 3)).await.unwrap();
        let other = store
            .begin_job_run(&Scope::new("tenant-2", "org-1"), start("k1", 3))
            .await
            .unwrap();
        assert!(other.should_run);

        let found = store
            .find_job_run(&scope(), "pdf_render_pages", "k1")
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(
            store
                .list_job_runs(&scope(), Some("token_rotate"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_email_log_roundtrip() {
        let store = test_store().await;
        let slot = store.begin_job_run(&scope(), start("k1", 3)).await.unwrap();

        let mut log = store
            .create_email_log(
                &scope(),
                NewEmailLog {
                    job_run_id: slot.run.id.clone(),
                    agreement_id: "a1".to_string(),
                    recipient_id: "s1".to_string(),
                    template_code: "esign.signing_request".to_string(),
                    correlation_id: "corr-1".to_string(),
                    max_attempts: 3,
                },
            )
            .await
            .unwrap();
        assert_eq!(log.status, EmailLogStatus::Queued);

        log.status = EmailLogStatus::Sent;
        log.attempt_count = 1;
        log.provider_message_id = Some("msg_0011223344556677".to_string());
        log.sent_at = Some(Utc::now());
        store.save_email_log(&scope(), &log).await.unwrap();

        let loaded = store
            .find_email_log_by_run(&scope(), &slot.run.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, EmailLogStatus::Sent);
        assert_eq!(loaded.provider_message_id, log.provider_message_id);
        assert_eq!(store.list_email_logs(&scope(), "a1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_events_reject_update_and_delete() {
        let store = test_store().await;
        let event = store
            .append_audit_event(
                &scope(),
                NewAuditEvent {
                    agreement_id: Some("a1".to_string()),
                    event_type: "job.failed".to_string(),
                    actor_type: "system".to_string(),
                    metadata: serde_json::json!({"attempt_count": 1}),
                },
            )
            .await
            .unwrap();

        let err = store
            .update_audit_event(&scope(), &event.id, serde_json::json!({"attempt_count": 9}))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "AUDIT_EVENTS_APPEND_ONLY");

        let err = store
            .delete_audit_event(&scope(), &event.id)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "AUDIT_EVENTS_APPEND_ONLY");

        let events = store.list_audit_events(&scope(), Some("a1")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata()["attempt_count"], 1);
    }
}
