// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Completion workflow.
//!
//! Runs after an agreement reaches `completed`:
//!
//! 1. `pdf_render_pages`
//! 2. `pdf_generate_executed`
//! 3. `pdf_generate_certificate`
//! 4. `email_send_signing_request` with the completion package to every CC
//!
//! Steps 1-3 stop the workflow on the first error. Step 4 attempts every CC
//! and returns the first error afterwards. One correlation id is shared by
//! every job.

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::context::JobContext;
use crate::email::Notification;
use crate::error::{EsignError, Result};
use crate::jobs::{ArtifactJob, EsignJobs, JobOutput, SendSigningRequest, resolve_correlation_id};
use crate::metrics;
use crate::model::{AgreementStatus, NewAuditEvent, audit_types};

const WORKFLOW_NAME: &str = "completion_workflow";

/// Outcome of one CC delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CcDelivery {
    pub recipient_id: String,
    pub provider_message_id: Option<String>,
    pub deduplicated: bool,
}

/// What a successful completion produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub agreement_id: String,
    pub correlation_id: String,
    pub rendered_pages: Option<u32>,
    pub executed_object_key: Option<String>,
    pub certificate_object_key: Option<String>,
    pub deliveries: Vec<CcDelivery>,
}

#[derive(Clone)]
pub struct CompletionWorkflow {
    jobs: EsignJobs,
}

impl CompletionWorkflow {
    pub fn new(jobs: EsignJobs) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &EsignJobs {
        &self.jobs
    }

    /// Finalize a completed agreement.
    #[instrument(skip(self, ctx, correlation_id), fields(tenant_id = %ctx.scope.tenant_id))]
    pub async fn complete(
        &self,
        ctx: &JobContext,
        agreement_id: &str,
        correlation_id: Option<&str>,
    ) -> Result<CompletionReport> {
        ctx.check()?;
        let agreement = self
            .jobs
            .stores()
            .agreements
            .require_agreement(&ctx.scope, agreement_id)
            .await?;
        if agreement.status != AgreementStatus::Completed {
            return Err(EsignError::CompletionPrecondition {
                agreement_id: agreement_id.to_string(),
                status: agreement.status.as_str().to_string(),
            });
        }

        let correlation_id =
            resolve_correlation_id(correlation_id, WORKFLOW_NAME, None, Some(agreement_id), None);
        let artifact = ArtifactJob::new(agreement_id).correlation(correlation_id.as_str());

        let pages = self.finalize_step(
            self.jobs.render_pages(ctx, artifact.clone()).await,
            "render_pages",
        )?;
        let executed = self.finalize_step(
            self.jobs.generate_executed(ctx, artifact.clone()).await,
            "generate_executed",
        )?;
        let certificate = self.finalize_step(
            self.jobs.generate_certificate(ctx, artifact).await,
            "generate_certificate",
        )?;

        let cc_ids: Vec<String> = agreement.cc_recipients().map(|r| r.id.clone()).collect();
        let deliveries = self
            .distribute(ctx, &agreement.id, &cc_ids, &correlation_id)
            .await?;

        let audit = self
            .jobs
            .stores()
            .audit
            .append_audit_event(
                &ctx.scope,
                NewAuditEvent {
                    agreement_id: Some(agreement.id.clone()),
                    event_type: audit_types::AGREEMENT_COMPLETED.to_string(),
                    actor_type: "system".to_string(),
                    metadata: json!({
                        "correlation_id": correlation_id,
                        "cc_count": deliveries.len(),
                    }),
                },
            )
            .await;
        if let Err(e) = audit {
            error!(
                agreement_id = %agreement.id,
                error = %e,
                "Failed to append completion audit event"
            );
        }

        info!(
            agreement_id = %agreement.id,
            correlation_id = %correlation_id,
            cc_count = deliveries.len(),
            "Agreement finalized"
        );

        Ok(CompletionReport {
            agreement_id: agreement.id,
            correlation_id,
            rendered_pages: pages,
            executed_object_key: executed,
            certificate_object_key: certificate,
            deliveries,
        })
    }

    fn finalize_step<T>(
        &self,
        outcome: Result<JobOutput<T>>,
        step: &'static str,
    ) -> Result<Option<T>> {
        match outcome {
            Ok(output) => Ok(output.value),
            Err(e) => {
                self.jobs
                    .metrics()
                    .increment(metrics::FINALIZE_FAILURE_TOTAL, None);
                error!(step, error_code = e.error_code(), error = %e, "Finalization step failed");
                Err(e)
            }
        }
    }

    /// Send the completion package to every CC concurrently.
    async fn distribute(
        &self,
        ctx: &JobContext,
        agreement_id: &str,
        cc_ids: &[String],
        correlation_id: &str,
    ) -> Result<Vec<CcDelivery>> {
        let sends = cc_ids.iter().map(|recipient_id| {
            let mut msg = SendSigningRequest::new(agreement_id, recipient_id.as_str())
                .notification(Notification::CompletionPackage)
                .correlation(correlation_id);
            msg.template_code =
                Some(Notification::CompletionPackage.default_template().to_string());
            async move {
                let outcome = self.jobs.send_signing_request(ctx, msg).await;
                (recipient_id, outcome)
            }
        });

        let mut deliveries = Vec::with_capacity(cc_ids.len());
        let mut first_error = None;
        for (recipient_id, outcome) in join_all(sends).await {
            match outcome {
                Ok(output) => deliveries.push(CcDelivery {
                    recipient_id: recipient_id.clone(),
                    provider_message_id: output.value,
                    deduplicated: output.deduplicated,
                }),
                Err(e) => {
                    warn!(
                        recipient_id = %recipient_id,
                        error = %e,
                        "Completion package delivery failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(deliveries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agreement, Recipient};
    use crate::store::Stores;

    #[tokio::test]
    async fn test_requires_completed_agreement() {
        let stores = Stores::memory();
        let ctx = JobContext::for_scope("t1", "o1");
        stores
            .agreements
            .insert_agreement(
                &ctx.scope,
                Agreement::draft("a1", "NDA")
                    .with_recipient(Recipient::cc("cc1", "Casey", "casey@example.com")),
            )
            .await
            .unwrap();
        let workflow = CompletionWorkflow::new(EsignJobs::builder(stores.clone()).build());

        let err = workflow.complete(&ctx, "a1", None).await.unwrap_err();
        assert_eq!(err.error_code(), "COMPLETION_PRECONDITION");

        let runs = stores.job_runs.list_job_runs(&ctx.scope, None).await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agreement() {
        let workflow = CompletionWorkflow::new(EsignJobs::builder(Stores::memory()).build());
        let ctx = JobContext::for_scope("t1", "o1");

        let err = workflow.complete(&ctx, "nope", None).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
