// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The execution envelope shared by every job kind.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::RetryPolicy;
use crate::context::JobContext;
use crate::error::{EsignError, Result};
use crate::metrics::{self, Metrics};
use crate::model::{JobRun, JobRunSlot, JobRunStart, JobRunStatus, NewAuditEvent, audit_types};
use crate::store::{AuditStore, JobRunStore};

const ACTOR_SYSTEM: &str = "system";

/// Identity of one job execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub job_name: &'static str,
    pub dedupe_key: String,
    pub agreement_id: Option<String>,
    pub recipient_id: Option<String>,
    pub correlation_id: String,
    pub max_attempts: u32,
}

impl JobRequest {
    fn start(&self) -> JobRunStart {
        JobRunStart {
            job_name: self.job_name.to_string(),
            dedupe_key: self.dedupe_key.clone(),
            agreement_id: self.agreement_id.clone(),
            recipient_id: self.recipient_id.clone(),
            correlation_id: self.correlation_id.clone(),
            max_attempts: self.max_attempts,
        }
    }
}

/// Dedupe slot acquisition, run bookkeeping, metrics and audit.
#[derive(Clone)]
pub struct JobEnvelope {
    job_runs: Arc<dyn JobRunStore>,
    audit: Arc<dyn AuditStore>,
    metrics: Arc<dyn Metrics>,
    policy: RetryPolicy,
}

impl JobEnvelope {
    pub fn new(
        job_runs: Arc<dyn JobRunStore>,
        audit: Arc<dyn AuditStore>,
        metrics: Arc<dyn Metrics>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            job_runs,
            audit,
            metrics,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Acquire the dedupe slot. `should_run = false` means another call
    /// owns or already finished this work.
    pub async fn begin(&self, ctx: &JobContext, request: &JobRequest) -> Result<JobRunSlot> {
        ctx.check()?;
        let slot = self.job_runs.begin_job_run(&ctx.scope, request.start()).await?;

        if slot.should_run {
            debug!(
                job = request.job_name,
                run_id = %slot.run.id,
                attempt = slot.run.attempt_count,
                correlation_id = %request.correlation_id,
                "Job run started"
            );
        } else {
            self.metrics
                .increment(metrics::JOB_DEDUPED_TOTAL, Some(request.job_name));
            info!(
                job = request.job_name,
                run_id = %slot.run.id,
                status = slot.run.status.as_str(),
                dedupe_key = %request.dedupe_key,
                "Job deduplicated"
            );
        }
        Ok(slot)
    }

    /// Mark `run` succeeded, count it and append `job.succeeded`.
    pub async fn succeed(&self, ctx: &JobContext, run: &JobRun) -> Result<JobRun> {
        let done = self
            .job_runs
            .mark_job_run_succeeded(&ctx.scope, &run.id)
            .await?;
        self.metrics
            .increment(metrics::JOB_SUCCESS_TOTAL, Some(done.job_name.as_str()));

        self.audit
            .append_audit_event(
                &ctx.scope,
                NewAuditEvent {
                    agreement_id: done.agreement_id.clone(),
                    event_type: audit_types::JOB_SUCCEEDED.to_string(),
                    actor_type: ACTOR_SYSTEM.to_string(),
                    metadata: json!({
                        "job_name": done.job_name,
                        "dedupe_key": done.dedupe_key,
                        "attempt_count": done.attempt_count,
                        "correlation_id": done.correlation_id,
                    }),
                },
            )
            .await?;

        info!(
            job = %done.job_name,
            run_id = %done.id,
            attempt = done.attempt_count,
            "Job run succeeded"
        );
        Ok(done)
    }

    /// Record `cause` against `run`: `retrying` with a `next_retry_at` while
    /// attempts remain and the error is retryable, `failed` otherwise.
    ///
    /// Returns the updated run, or `None` if recording itself failed. The
    /// caller still returns `cause`.
    pub async fn fail(&self, ctx: &JobContext, run: &JobRun, cause: &EsignError) -> Option<JobRun> {
        let next_retry_at = if cause.is_retryable() {
            self.policy
                .next_retry_at(Utc::now(), run.attempt_count, run.max_attempts)
        } else {
            None
        };
        let message = cause.to_string();

        let failed = match self
            .job_runs
            .mark_job_run_failed(&ctx.scope, &run.id, &message, next_retry_at)
            .await
        {
            Ok(failed) => failed,
            Err(e) => {
                error!(
                    job = %run.job_name,
                    run_id = %run.id,
                    error = %e,
                    cause = %message,
                    "Failed to record job failure"
                );
                return None;
            }
        };

        self.metrics
            .increment(metrics::JOB_FAILURE_TOTAL, Some(failed.job_name.as_str()));
        if failed.status == JobRunStatus::Retrying {
            self.metrics
                .increment(metrics::JOB_RETRY_TOTAL, Some(failed.job_name.as_str()));
            warn!(
                job = %failed.job_name,
                run_id = %failed.id,
                attempt = failed.attempt_count,
                max_attempts = failed.max_attempts,
                next_retry_at = ?failed.next_retry_at,
                error = %message,
                "Job attempt failed, retry scheduled"
            );
        } else {
            error!(
                job = %failed.job_name,
                run_id = %failed.id,
                attempt = failed.attempt_count,
                error_code = cause.error_code(),
                error = %message,
                "Job run failed"
            );
        }

        let audit = self
            .audit
            .append_audit_event(
                &ctx.scope,
                NewAuditEvent {
                    agreement_id: failed.agreement_id.clone(),
                    event_type: audit_types::JOB_FAILED.to_string(),
                    actor_type: ACTOR_SYSTEM.to_string(),
                    metadata: json!({
                        "job_name": failed.job_name,
                        "dedupe_key": failed.dedupe_key,
                        "attempt_count": failed.attempt_count,
                        "correlation_id": failed.correlation_id,
                        "error_code": cause.error_code(),
                        "last_error": message,
                        "next_retry_at": failed.next_retry_at.map(|at| at.to_rfc3339()),
                    }),
                },
            )
            .await;
        if let Err(e) = audit {
            error!(run_id = %failed.id, error = %e, "Failed to append job.failed audit event");
        }

        Some(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn envelope(store: Arc<MemoryStore>, metrics: Arc<InMemoryMetrics>) -> JobEnvelope {
        JobEnvelope::new(
            store.clone(),
            store,
            metrics,
            RetryPolicy::new(Duration::from_secs(1), 3),
        )
    }

    fn request() -> JobRequest {
        JobRequest {
            job_name: super::super::TOKEN_ROTATE,
            dedupe_key: "a1|s1|sign|corr-1".to_string(),
            agreement_id: Some("a1".to_string()),
            recipient_id: Some("s1".to_string()),
            correlation_id: "corr-1".to_string(),
            max_attempts: 2,
        }
    }

    #[tokio::test]
    async fn test_success_records_audit_and_metric() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let envelope = envelope(store.clone(), metrics.clone());
        let ctx = JobContext::for_scope("t1", "o1");

        let slot = envelope.begin(&ctx, &request()).await.unwrap();
        assert!(slot.should_run);
        let done = envelope.succeed(&ctx, &slot.run).await.unwrap();
        assert_eq!(done.status, JobRunStatus::Succeeded);

        let replay = envelope.begin(&ctx, &request()).await.unwrap();
        assert!(!replay.should_run);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.job_counter(metrics::JOB_SUCCESS_TOTAL, "token_rotate"), 1);
        assert_eq!(snapshot.job_counter(metrics::JOB_DEDUPED_TOTAL, "token_rotate"), 1);

        let events = store.list_audit_events(&ctx.scope, Some("a1")).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, audit_types::JOB_SUCCEEDED);
        assert_eq!(events[0].metadata()["correlation_id"], "corr-1");
    }

    #[tokio::test]
    async fn test_retryable_failure_until_exhausted() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let envelope = envelope(store.clone(), metrics.clone());
        let ctx = JobContext::for_scope("t1", "o1");
        let cause = EsignError::transient("smtp", "connection refused");

        let slot = envelope.begin(&ctx, &request()).await.unwrap();
        let first = envelope.fail(&ctx, &slot.run, &cause).await.unwrap();
        assert_eq!(first.status, JobRunStatus::Retrying);
        assert!(first.next_retry_at.is_some());

        let slot = envelope.begin(&ctx, &request()).await.unwrap();
        assert_eq!(slot.run.attempt_count, 2);
        let second = envelope.fail(&ctx, &slot.run, &cause).await.unwrap();
        assert_eq!(second.status, JobRunStatus::Failed);
        assert!(second.next_retry_at.is_none());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.job_counter(metrics::JOB_FAILURE_TOTAL, "token_rotate"), 2);
        assert_eq!(snapshot.job_counter(metrics::JOB_RETRY_TOTAL, "token_rotate"), 1);

        let events = store.list_audit_events(&ctx.scope, None).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == audit_types::JOB_FAILED));
        assert!(events[1].metadata()["next_retry_at"].is_null());
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_terminal() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let envelope = envelope(store, metrics);
        let ctx = JobContext::for_scope("t1", "o1");

        let slot = envelope.begin(&ctx, &request()).await.unwrap();
        let failed = envelope
            .fail(&ctx, &slot.run, &EsignError::not_found("agreement", "a1"))
            .await
            .unwrap();
        assert_eq!(failed.status, JobRunStatus::Failed);
        assert_eq!(failed.attempt_count, 1);
    }
}
