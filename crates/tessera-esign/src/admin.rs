// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Back-office integration.
//!
//! Exposes agreements as an admin [`Repository`], finalization as a command
//! and persisted job runs as the jobs page status source.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tessera_admin::commands::{CommandHandler, CommandMessage};
use tessera_admin::jobs::{JobStatus, JobStatusSource};
use tessera_admin::{AdminContext, AdminError, ListOptions, ListResult, Record, Repository};
use tracing::info;
use uuid::Uuid;

use crate::context::JobContext;
use crate::model::{Agreement, AgreementDraft, AgreementStatus};
use crate::store::{AgreementStore, JobRunStore};
use crate::workflow::CompletionWorkflow;

/// Command name of [`CompleteAgreementCommand`].
pub const COMPLETE_AGREEMENT_COMMAND: &str = "esign.complete_agreement";

type AdminResult<T> = tessera_admin::Result<T>;

// ============================================================================
// Agreements repository
// ============================================================================

/// Agreements as admin records.
///
/// Cells: `title`, `status`, `recipients` (count), `rendered_pages`,
/// `executed_object_key`, `certificate_object_key`, `created_at`,
/// `updated_at`, `completed_at`. Writing `status` moves the lifecycle;
/// writing `title` edits the draft.
pub struct AgreementRepository {
    agreements: Arc<dyn AgreementStore>,
}

impl AgreementRepository {
    pub fn new(agreements: Arc<dyn AgreementStore>) -> Self {
        Self { agreements }
    }
}

fn agreement_record(agreement: &Agreement) -> Record {
    let mut record = Record::new()
        .with("title", agreement.title.as_str())
        .with("status", agreement.status.as_str())
        .with("recipients", agreement.recipients.len() as i64)
        .with("created_at", agreement.created_at)
        .with("updated_at", agreement.updated_at);
    if let Some(pages) = agreement.rendered_pages {
        record.set("rendered_pages", i64::from(pages));
    }
    if let Some(key) = &agreement.executed_object_key {
        record.set("executed_object_key", key.as_str());
    }
    if let Some(key) = &agreement.certificate_object_key {
        record.set("certificate_object_key", key.as_str());
    }
    if let Some(at) = agreement.completed_at {
        record.set("completed_at", at);
    }
    record.id = agreement.id.clone();
    record
}

fn requested_status(patch: &Record) -> AdminResult<Option<AgreementStatus>> {
    match patch.get_str("status") {
        None => Ok(None),
        Some(raw) => AgreementStatus::parse(raw)
            .map(Some)
            .ok_or_else(|| AdminError::invalid("status", format!("unknown status '{}'", raw))),
    }
}

#[async_trait]
impl Repository for AgreementRepository {
    async fn list(&self, ctx: &AdminContext, options: ListOptions) -> AdminResult<ListResult> {
        let options = options.normalized();
        let term = options.search_term().map(str::to_lowercase);
        let status = options.filters.get("status").filter(|s| !s.is_empty());

        let matching: Vec<Agreement> = self
            .agreements
            .list_agreements(&ctx.scope)
            .await?
            .into_iter()
            .filter(|a| {
                term.as_deref()
                    .is_none_or(|t| a.title.to_lowercase().contains(t))
            })
            .filter(|a| status.is_none_or(|s| a.status.as_str() == s.as_str()))
            .collect();

        let total = matching.len();
        let records = matching
            .iter()
            .skip(options.offset())
            .take(options.per_page)
            .map(agreement_record)
            .collect();
        Ok(ListResult { records, total })
    }

    async fn get(&self, ctx: &AdminContext, id: &str) -> AdminResult<Record> {
        let agreement = self.agreements.require_agreement(&ctx.scope, id).await?;
        Ok(agreement_record(&agreement))
    }

    async fn create(&self, ctx: &AdminContext, record: Record) -> AdminResult<Record> {
        let title = record
            .get_str("title")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AdminError::invalid("title", "is required"))?;
        let agreement = self
            .agreements
            .insert_agreement(&ctx.scope, Agreement::draft(Uuid::new_v4().to_string(), title))
            .await?;
        Ok(agreement_record(&agreement))
    }

    async fn update(&self, ctx: &AdminContext, id: &str, patch: Record) -> AdminResult<Record> {
        let status = requested_status(&patch)?;
        let mut agreement = self.agreements.require_agreement(&ctx.scope, id).await?;

        if let Some(title) = patch.get_str("title") {
            agreement = self
                .agreements
                .update_draft(
                    &ctx.scope,
                    id,
                    AgreementDraft {
                        title: Some(title.to_string()),
                        recipients: None,
                    },
                )
                .await?;
        }
        if let Some(next) = status.filter(|next| *next != agreement.status) {
            agreement = self.agreements.transition(&ctx.scope, id, next).await?;
        }
        Ok(agreement_record(&agreement))
    }

    async fn delete(&self, ctx: &AdminContext, id: &str) -> AdminResult<()> {
        Ok(self.agreements.delete_agreement(&ctx.scope, id).await?)
    }
}

// ============================================================================
// Complete command
// ============================================================================

/// Moves `sent` agreements to `completed` and runs the completion workflow.
///
/// Targets come from `ids`, or from `payload.agreement_id`. An optional
/// `payload.correlation_id` is threaded through every job.
pub struct CompleteAgreementCommand {
    workflow: CompletionWorkflow,
}

impl CompleteAgreementCommand {
    pub fn new(workflow: CompletionWorkflow) -> Self {
        Self { workflow }
    }
}

#[async_trait]
impl CommandHandler for CompleteAgreementCommand {
    fn command_name(&self) -> &str {
        COMPLETE_AGREEMENT_COMMAND
    }

    fn description(&self) -> &str {
        "Complete an agreement and distribute the completion package"
    }

    async fn execute(&self, ctx: &AdminContext, message: &CommandMessage) -> AdminResult<JsonValue> {
        let mut ids = message.ids.clone();
        if let Some(id) = message.payload.get("agreement_id").and_then(JsonValue::as_str) {
            ids.push(id.to_string());
        }
        if ids.is_empty() {
            return Err(AdminError::invalid("agreement_id", "is required"));
        }
        let correlation_id = message
            .payload
            .get("correlation_id")
            .and_then(JsonValue::as_str);

        let job_ctx = JobContext::background(ctx.scope.clone());
        let agreements = &self.workflow.jobs().stores().agreements;
        let mut reports = Vec::with_capacity(ids.len());
        for id in &ids {
            let agreement = agreements.require_agreement(&job_ctx.scope, id).await?;
            if agreement.status == AgreementStatus::Sent {
                agreements
                    .transition(&job_ctx.scope, id, AgreementStatus::Completed)
                    .await?;
            }
            let report = self.workflow.complete(&job_ctx, id, correlation_id).await?;
            info!(agreement_id = %id, user_id = %ctx.user_id, "Agreement completed from admin");
            reports.push(report);
        }

        Ok(json!({ "completed": reports }))
    }
}

// ============================================================================
// Job status
// ============================================================================

/// Latest persisted run of a job within the caller's scope.
pub struct JobRunStatusSource {
    job_runs: Arc<dyn JobRunStore>,
}

impl JobRunStatusSource {
    pub fn new(job_runs: Arc<dyn JobRunStore>) -> Self {
        Self { job_runs }
    }
}

#[async_trait]
impl JobStatusSource for JobRunStatusSource {
    async fn status(&self, ctx: &AdminContext, job_name: &str) -> AdminResult<Option<JobStatus>> {
        let runs = self
            .job_runs
            .list_job_runs(&ctx.scope, Some(job_name))
            .await?;
        Ok(runs.into_iter().next().map(|run| JobStatus {
            status: run.status.as_str().to_string(),
            last_run_at: run.attempted_at.or(Some(run.updated_at)),
            last_error: run.last_error,
            attempt_count: run.attempt_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{EsignJobs, GOOGLE_DRIVE_IMPORT, TOKEN_ROTATE};
    use crate::model::{JobRunStart, Recipient};
    use crate::store::Stores;
    use tessera_admin::Scope;

    fn ctx() -> AdminContext {
        AdminContext::system(Scope::new("t1", "o1"))
    }

    #[tokio::test]
    async fn test_repository_crud_and_search() {
        let stores = Stores::memory();
        let repo = AgreementRepository::new(stores.agreements.clone());

        let created = repo
            .create(&ctx(), Record::new().with("title", "Master Services Agreement"))
            .await
            .unwrap();
        repo.create(&ctx(), Record::new().with("title", "NDA"))
            .await
            .unwrap();
        assert_eq!(created.get_str("status"), Some("draft"));

        let found = repo
            .list(&ctx(), ListOptions::default().filter("_search", "services"))
            .await
            .unwrap();
        assert_eq!(found.total, 1);
        assert_eq!(found.records[0].id, created.id);

        let renamed = repo
            .update(&ctx(), &created.id, Record::new().with("title", "MSA"))
            .await
            .unwrap();
        assert_eq!(renamed.get_str("title"), Some("MSA"));

        repo.delete(&ctx(), &created.id).await.unwrap();
        let err = repo.get(&ctx(), &created.id).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_completed_agreement_is_immutable() {
        let stores = Stores::memory();
        let repo = AgreementRepository::new(stores.agreements.clone());
        let created = repo
            .create(&ctx(), Record::new().with("title", "NDA"))
            .await
            .unwrap();
        repo.update(&ctx(), &created.id, Record::new().with("status", "sent"))
            .await
            .unwrap();
        repo.update(&ctx(), &created.id, Record::new().with("status", "completed"))
            .await
            .unwrap();

        let err = repo
            .update(&ctx(), &created.id, Record::new().with("title", "Changed"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "AGREEMENT_IMMUTABLE");
        assert_eq!(err.http_status().as_u16(), 409);

        let err = repo.delete(&ctx(), &created.id).await.unwrap_err();
        assert_eq!(err.error_code(), "AGREEMENT_IMMUTABLE");
    }

    #[tokio::test]
    async fn test_complete_command_runs_workflow() {
        let stores = Stores::memory();
        let scope = Scope::new("t1", "o1");
        stores
            .agreements
            .insert_agreement(
                &scope,
                Agreement::draft("a1", "NDA")
                    .with_recipient(Recipient::signer("s1", "Sam", "sam@example.com"))
                    .with_status(AgreementStatus::Sent),
            )
            .await
            .unwrap();
        let workflow = CompletionWorkflow::new(EsignJobs::builder(stores.clone()).build());
        let command = CompleteAgreementCommand::new(workflow);

        let message =
            CommandMessage::new(COMPLETE_AGREEMENT_COMMAND).with_ids(vec!["a1".to_string()]);
        let result = command.execute(&ctx(), &message).await.unwrap();
        assert_eq!(result["completed"][0]["agreement_id"], "a1");

        let agreement = stores.agreements.require_agreement(&scope, "a1").await.unwrap();
        assert_eq!(agreement.status, AgreementStatus::Completed);
        assert!(agreement.executed_object_key.is_some());
    }

    #[tokio::test]
    async fn test_job_status_from_latest_run() {
        let stores = Stores::memory();
        let source = JobRunStatusSource::new(stores.job_runs.clone());
        let scope = Scope::new("t1", "o1");

        assert!(source.status(&ctx(), TOKEN_ROTATE).await.unwrap().is_none());

        let slot = stores
            .job_runs
            .begin_job_run(
                &scope,
                JobRunStart {
                    job_name: GOOGLE_DRIVE_IMPORT.to_string(),
                    dedupe_key: "u1|g1".to_string(),
                    agreement_id: None,
                    recipient_id: None,
                    correlation_id: "corr-1".to_string(),
                    max_attempts: 3,
                },
            )
            .await
            .unwrap();
        stores
            .job_runs
            .mark_job_run_failed(&scope, &slot.run.id, "quota exceeded", None)
            .await
            .unwrap();

        let status = source.status(&ctx(), GOOGLE_DRIVE_IMPORT).await.unwrap().unwrap();
        assert_eq!(status.status, "failed");
        assert_eq!(status.last_error.as_deref(), Some("quota exceeded"));
        assert_eq!(status.attempt_count, 1);
    }
}
