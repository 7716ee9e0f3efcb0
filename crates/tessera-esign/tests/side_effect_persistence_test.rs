// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bookkeeping writes that fail after an email was sent or an artifact was
//! produced leave the run succeeded, so replays do not repeat the work.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tessera_admin::Scope;

use common::{CountingPipeline, Harness, completed_agreement, sent_agreement};
use tessera_esign::jobs::{ArtifactJob, SendSigningRequest};
use tessera_esign::model::{
    Agreement, AgreementDraft, AgreementStatus, ArtifactUpdate, EmailLog, EmailLogStatus,
    JobRunStatus, NewEmailLog,
};
use tessera_esign::store::{AgreementStore, EmailLogStore, MemoryStore};
use tessera_esign::{EsignError, Result, Stores};

/// Email log store whose first `failures` saves of a `sent` log fail.
struct FlakyEmailLogs {
    inner: Arc<MemoryStore>,
    failures: usize,
    sent_saves: AtomicUsize,
}

#[async_trait]
impl EmailLogStore for FlakyEmailLogs {
    async fn create_email_log(&self, scope: &Scope, log: NewEmailLog) -> Result<EmailLog> {
        self.inner.create_email_log(scope, log).await
    }

    async fn find_email_log_by_run(
        &self,
        scope: &Scope,
        job_run_id: &str,
    ) -> Result<Option<EmailLog>> {
        self.inner.find_email_log_by_run(scope, job_run_id).await
    }

    async fn save_email_log(&self, scope: &Scope, log: &EmailLog) -> Result<()> {
        if log.status == EmailLogStatus::Sent
            && self.sent_saves.fetch_add(1, Ordering::SeqCst) < self.failures
        {
            return Err(EsignError::transient("database", "disk I/O error"));
        }
        self.inner.save_email_log(scope, log).await
    }

    async fn list_email_logs(&self, scope: &Scope, agreement_id: &str) -> Result<Vec<EmailLog>> {
        self.inner.list_email_logs(scope, agreement_id).await
    }
}

/// Agreement store whose artifact writes always fail.
struct ReadOnlyArtifacts {
    inner: Arc<MemoryStore>,
    attempts: AtomicUsize,
}

#[async_trait]
impl AgreementStore for ReadOnlyArtifacts {
    async fn insert_agreement(&self, scope: &Scope, agreement: Agreement) -> Result<Agreement> {
        self.inner.insert_agreement(scope, agreement).await
    }

    async fn get_agreement(&self, scope: &Scope, id: &str) -> Result<Option<Agreement>> {
        self.inner.get_agreement(scope, id).await
    }

    async fn list_agreements(&self, scope: &Scope) -> Result<Vec<Agreement>> {
        self.inner.list_agreements(scope).await
    }

    async fn update_draft(
        &self,
        scope: &Scope,
        id: &str,
        draft: AgreementDraft,
    ) -> Result<Agreement> {
        self.inner.update_draft(scope, id, draft).await
    }

    async fn transition(
        &self,
        scope: &Scope,
        id: &str,
        next: AgreementStatus,
    ) -> Result<Agreement> {
        self.inner.transition(scope, id, next).await
    }

    async fn set_artifact(
        &self,
        _scope: &Scope,
        _id: &str,
        _update: ArtifactUpdate,
    ) -> Result<Agreement> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(EsignError::transient("database", "database is locked"))
    }

    async fn delete_agreement(&self, scope: &Scope, id: &str) -> Result<()> {
        self.inner.delete_agreement(scope, id).await
    }
}

fn with_flaky_logs(failures: usize) -> Stores {
    let memory = Arc::new(MemoryStore::new());
    Stores {
        email_logs: Arc::new(FlakyEmailLogs {
            inner: memory.clone(),
            failures,
            sent_saves: AtomicUsize::new(0),
        }),
        ..stores_over(memory)
    }
}

fn stores_over(memory: Arc<MemoryStore>) -> Stores {
    Stores {
        agreements: memory.clone(),
        job_runs: memory.clone(),
        email_logs: memory.clone(),
        audit: memory.clone(),
        documents: memory,
    }
}

#[tokio::test]
async fn test_sent_log_write_is_retried() {
    let h = Harness::with_stores(with_flaky_logs(1), |p| p, CountingPipeline::default());
    h.seed(sent_agreement("a1")).await;
    let msg = SendSigningRequest::new("a1", "s1").correlation("corr-1");

    let out = h
        .jobs
        .send_signing_request(&h.ctx, msg.clone())
        .await
        .unwrap();
    assert_eq!(out.run.status, JobRunStatus::Succeeded);

    let logs = h
        .stores
        .email_logs
        .list_email_logs(&h.ctx.scope, "a1")
        .await
        .unwrap();
    assert_eq!(logs[0].status, EmailLogStatus::Sent);
    assert_eq!(logs[0].provider_message_id, out.value);

    let replay = h.jobs.send_signing_request(&h.ctx, msg).await.unwrap();
    assert!(replay.deduplicated);
    assert_eq!(replay.value, out.value);
    assert_eq!(h.provider.sends(), 1);
}

#[tokio::test]
async fn test_unsaved_sent_log_does_not_resend() {
    let h = Harness::with_stores(
        with_flaky_logs(usize::MAX),
        |p| p,
        CountingPipeline::default(),
    );
    h.seed(sent_agreement("a1")).await;
    let msg = SendSigningRequest::new("a1", "s1").correlation("corr-1");

    let out = h
        .jobs
        .send_signing_request(&h.ctx, msg.clone())
        .await
        .unwrap();
    assert_eq!(out.run.status, JobRunStatus::Succeeded);
    assert!(out.value.is_some());

    let replay = h.jobs.send_signing_request(&h.ctx, msg).await.unwrap();
    assert!(replay.deduplicated);
    assert_eq!(replay.run.id, out.run.id);
    assert_eq!(replay.run.status, JobRunStatus::Succeeded);
    assert_eq!(h.provider.sends(), 1);
}

#[tokio::test]
async fn test_unrecorded_artifact_does_not_regenerate() {
    let memory = Arc::new(MemoryStore::new());
    let agreements = Arc::new(ReadOnlyArtifacts {
        inner: memory.clone(),
        attempts: AtomicUsize::new(0),
    });
    let stores = Stores {
        agreements: agreements.clone(),
        ..stores_over(memory)
    };
    let h = Harness::with_stores(stores, |p| p, CountingPipeline::default());
    h.seed(completed_agreement("a1", &[])).await;
    let msg = ArtifactJob::new("a1").correlation("corr-1");

    let out = h
        .jobs
        .generate_executed(&h.ctx, msg.clone())
        .await
        .unwrap();
    assert_eq!(out.run.status, JobRunStatus::Succeeded);
    assert!(out.value.is_some());
    assert_eq!(agreements.attempts.load(Ordering::SeqCst), 2);

    let replay = h.jobs.generate_executed(&h.ctx, msg).await.unwrap();
    assert!(replay.deduplicated);
    assert_eq!(replay.run.status, JobRunStatus::Succeeded);
    assert_eq!(h.pipeline.executed.load(Ordering::SeqCst), 1);
}
