// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory store backend.
//!
//! One mutex guards every table, so `begin_job_run` is atomic against
//! concurrent attempts for the same dedupe key.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tessera_admin::Scope;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{EsignError, Result};
use crate::model::{
    Agreement, AgreementDraft, AgreementStatus, ArtifactUpdate, AuditEvent, Document, EmailLog,
    EmailLogStatus, JobRun, JobRunSlot, JobRunStart, JobRunStatus, NewAuditEvent, NewEmailLog,
};

use super::{AgreementStore, AuditStore, DocumentStore, EmailLogStore, JobRunStore};

#[derive(Default)]
struct Tables {
    agreements: BTreeMap<Scope, Vec<Agreement>>,
    job_runs: BTreeMap<Scope, Vec<JobRun>>,
    email_logs: BTreeMap<Scope, Vec<EmailLog>>,
    audit_events: BTreeMap<Scope, Vec<AuditEvent>>,
    documents: BTreeMap<Scope, Vec<Document>>,
}

/// Process-local store implementing every store trait.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find_agreement<'a>(
    tables: &'a mut Tables,
    scope: &Scope,
    id: &str,
) -> Result<&'a mut Agreement> {
    tables
        .agreements
        .get_mut(scope)
        .and_then(|rows| rows.iter_mut().find(|a| a.id == id))
        .ok_or_else(|| EsignError::not_found("agreement", id))
}

fn find_run<'a>(tables: &'a mut Tables, scope: &Scope, id: &str) -> Result<&'a mut JobRun> {
    tables
        .job_runs
        .get_mut(scope)
        .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
        .ok_or_else(|| EsignError::not_found("job run", id))
}

#[async_trait]
impl AgreementStore for MemoryStore {
    async fn insert_agreement(&self, scope: &Scope, agreement: Agreement) -> Result<Agreement> {
        let mut tables = self.tables.lock().await;
        let rows = tables.agreements.entry(scope.clone()).or_default();
        if rows.iter().any(|a| a.id == agreement.id) {
            return Err(EsignError::Validation {
                field: "id".to_string(),
                message: format!("agreement '{}' already exists", agreement.id),
            });
        }
        rows.push(agreement.clone());
        Ok(agreement)
    }

    async fn get_agreement(&self, scope: &Scope, id: &str) -> Result<Option<Agreement>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .agreements
            .get(scope)
            .and_then(|rows| rows.iter().find(|a| a.id == id))
            .cloned())
    }

    async fn list_agreements(&self, scope: &Scope) -> Result<Vec<Agreement>> {
        let tables = self.tables.lock().await;
        Ok(tables.agreements.get(scope).cloned().unwrap_or_default())
    }

    async fn update_draft(
        &self,
        scope: &Scope,
        id: &str,
        draft: AgreementDraft,
    ) -> Result<Agreement> {
        let mut tables = self.tables.lock().await;
        let agreement = find_agreement(&mut tables, scope, id)?;
        if agreement.status.is_terminal() {
            return Err(EsignError::AgreementImmutable {
                agreement_id: id.to_string(),
            });
        }
        if let Some(title) = draft.title {
            agreement.title = title;
        }
        if let Some(recipients) = draft.recipients {
            agreement.recipients = recipients;
        }
        agreement.updated_at = Utc::now();
        Ok(agreement.clone())
    }

    async fn transition(
        &self,
        scope: &Scope,
        id: &str,
        next: AgreementStatus,
    ) -> Result<Agreement> {
        let mut tables = self.tables.lock().await;
        let agreement = find_agreement(&mut tables, scope, id)?;
        if agreement.status.is_terminal() {
            return Err(EsignError::AgreementImmutable {
                agreement_id: id.to_string(),
            });
        }
        if !agreement.status.can_transition_to(next) {
            return Err(EsignError::InvalidTransition {
                agreement_id: id.to_string(),
                from: agreement.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        let now = Utc::now();
        agreement.status = next;
        agreement.updated_at = now;
        if next == AgreementStatus::Completed {
            agreement.completed_at = Some(now);
        }
        Ok(agreement.clone())
    }

    async fn set_artifact(
        &self,
        scope: &Scope,
        id: &str,
        update: ArtifactUpdate,
    ) -> Result<Agreement> {
        let mut tables = self.tables.lock().await;
        let agreement = find_agreement(&mut tables, scope, id)?;
        match update {
            ArtifactUpdate::RenderedPages(pages) => agreement.rendered_pages = Some(pages),
            ArtifactUpdate::Executed(key) => agreement.executed_object_key = Some(key),
            ArtifactUpdate::Certificate(key) => agreement.certificate_object_key = Some(key),
        }
        agreement.updated_at = Utc::now();
        Ok(agreement.clone())
    }

    async fn delete_agreement(&self, scope: &Scope, id: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let status = find_agreement(&mut tables, scope, id)?.status;
        if status.is_terminal() {
            return Err(EsignError::AgreementImmutable {
                agreement_id: id.to_string(),
            });
        }
        if let Some(rows) = tables.agreements.get_mut(scope) {
            rows.retain(|a| a.id != id);
        }
        Ok(())
    }
}

#[async_trait]
impl JobRunStore for MemoryStore {
    async fn begin_job_run(&self, scope: &Scope, start: JobRunStart) -> Result<JobRunSlot> {
        let mut tables = self.tables.lock().await;
        let rows = tables.job_runs.entry(scope.clone()).or_default();
        let now = Utc::now();

        if let Some(run) = rows
            .iter_mut()
            .find(|r| r.job_name == start.job_name && r.dedupe_key == start.dedupe_key)
        {
            if !run.status.can_retry() {
                return Ok(JobRunSlot {
                    run: run.clone(),
                    should_run: false,
                });
            }
            run.status = JobRunStatus::Running;
            run.attempt_count += 1;
            run.max_attempts = start.max_attempts;
            run.last_error = None;
            run.next_retry_at = None;
            run.attempted_at = Some(now);
            run.updated_at = now;
            return Ok(JobRunSlot {
                run: run.clone(),
                should_run: true,
            });
        }

        let run = JobRun {
            id: Uuid::new_v4().to_string(),
            job_name: start.job_name,
            dedupe_key: start.dedupe_key,
            agreement_id: start.agreement_id,
            recipient_id: start.recipient_id,
            correlation_id: start.correlation_id,
            status: JobRunStatus::Running,
            attempt_count: 1,
            max_attempts: start.max_attempts,
            last_error: None,
            next_retry_at: None,
            attempted_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        rows.push(run.clone());
        Ok(JobRunSlot {
            run,
            should_run: true,
        })
    }

    async fn mark_job_run_succeeded(&self, scope: &Scope, id: &str) -> Result<JobRun> {
        let mut tables = self.tables.lock().await;
        let run = find_run(&mut tables, scope, id)?;
        run.status = JobRunStatus::Succeeded;
        run.last_error = None;
        run.next_retry_at = None;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn mark_job_run_failed(
        &self,
        scope: &Scope,
        id: &str,
        last_error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<JobRun> {
        let mut tables = self.tables.lock().await;
        let run = find_run(&mut tables, scope, id)?;
        run.status = if next_retry_at.is_some() {
            JobRunStatus::Retrying
        } else {
            JobRunStatus::Failed
        };
        run.last_error = Some(last_error.to_string());
        run.next_retry_at = next_retry_at;
        run.updated_at = Utc::now();
        Ok(run.clone())
    }

    async fn get_job_run(&self, scope: &Scope, id: &str) -> Result<Option<JobRun>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .job_runs
            .get(scope)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned())
    }

    async fn find_job_run(
        &self,
        scope: &Scope,
        job_name: &str,
        dedupe_key: &str,
    ) -> Result<Option<JobRun>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .job_runs
            .get(scope)
            .and_then(|rows| {
                rows.iter()
                    .find(|r| r.job_name == job_name && r.dedupe_key == dedupe_key)
            })
            .cloned())
    }

    async fn list_job_runs(&self, scope: &Scope, job_name: Option<&str>) -> Result<Vec<JobRun>> {
        let tables = self.tables.lock().await;
        let mut runs: Vec<JobRun> = tables
            .job_runs
            .get(scope)
            .map(|rows| {
                rows.iter()
                    .filter(|r| job_name.is_none_or(|name| r.job_name == name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(runs)
    }
}

#[async_trait]
impl EmailLogStore for MemoryStore {
    async fn create_email_log(&self, scope: &Scope, log: NewEmailLog) -> Result<EmailLog> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let log = EmailLog {
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
        tables
            .email_logs
            .entry(scope.clone())
            .or_default()
            .push(log.clone());
        Ok(log)
    }

    async fn find_email_log_by_run(
        &self,
        scope: &Scope,
        job_run_id: &str,
    ) -> Result<Option<EmailLog>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .email_logs
            .get(scope)
            .and_then(|rows| rows.iter().find(|l| l.job_run_id == job_run_id))
            .cloned())
    }

    async fn save_email_log(&self, scope: &Scope, log: &EmailLog) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let slot = tables
            .email_logs
            .get_mut(scope)
            .and_then(|rows| rows.iter_mut().find(|l| l.id == log.id))
            .ok_or_else(|| EsignError::not_found("email log", &log.id))?;
        *slot = EmailLog {
            updated_at: Utc::now(),
            ..log.clone()
        };
        Ok(())
    }

    async fn list_email_logs(&self, scope: &Scope, agreement_id: &str) -> Result<Vec<EmailLog>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .email_logs
            .get(scope)
            .map(|rows| {
                rows.iter()
                    .filter(|l| l.agreement_id == agreement_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append_audit_event(&self, scope: &Scope, event: NewAuditEvent) -> Result<AuditEvent> {
        let mut tables = self.tables.lock().await;
        let event = AuditEvent {
            id: Uuid::new_v4().to_string(),
            agreement_id: event.agreement_id,
            event_type: event.event_type,
            actor_type: event.actor_type,
            metadata_json: event.metadata.to_string(),
            created_at: Utc::now(),
        };
        tables
            .audit_events
            .entry(scope.clone())
            .or_default()
            .push(event.clone());
        Ok(event)
    }

    async fn list_audit_events(
        &self,
        scope: &Scope,
        agreement_id: Option<&str>,
    ) -> Result<Vec<AuditEvent>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .audit_events
            .get(scope)
            .map(|rows| {
                rows.iter()
                    .filter(|e| agreement_id.is_none_or(|id| e.agreement_id.as_deref() == Some(id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_audit_event(
        &self,
        _scope: &Scope,
        _id: &str,
        _metadata: serde_json::Value,
    ) -> Result<AuditEvent> {
        Err(EsignError::AuditEventsAppendOnly)
    }

    async fn delete_audit_event(&self, _scope: &Scope, _id: &str) -> Result<()> {
        Err(EsignError::AuditEventsAppendOnly)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, scope: &Scope, document: Document) -> Result<Document> {
        let mut tables = self.tables.lock().await;
        tables
            .documents
            .entry(scope.clone())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn list_documents(&self, scope: &Scope) -> Result<Vec<Document>> {
        let tables = self.tables.lock().await;
        Ok(tables.documents.get(scope).cloned().unwrap_or_default())
    }
}
