// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The six job handlers.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use super::{
    ArtifactJob, EMAIL_SEND_SIGNING_REQUEST, GOOGLE_DRIVE_IMPORT, GoogleDriveImport,
    JobEnvelope, JobOutput, JobRequest, PDF_GENERATE_CERTIFICATE, PDF_GENERATE_EXECUTED,
    PDF_RENDER_PAGES, RetryPolicy, RotateToken, SendSigningRequest, TOKEN_ROTATE, dedupe_key,
    non_empty, resolve_correlation_id,
};
use crate::artifacts::{ArtifactPipeline, DeterministicArtifactPipeline, GoogleImporter};
use crate::config::{DEFAULT_PUBLIC_BASE_URL, EsignConfig};
use crate::context::JobContext;
use crate::email::{self, DeterministicProvider, EmailInput, EmailProvider, Notification, links};
use crate::error::{EsignError, Result};
use crate::metrics::{Metrics, NoopMetrics};
use crate::model::{
    Agreement, ArtifactUpdate, Document, EmailLog, EmailLogStatus, JobRun, JobRunStatus,
    NewEmailLog,
};
use crate::store::Stores;
use crate::tokens::{TokenPurpose, TokenService};

/// Job handlers and their collaborators.
#[derive(Clone)]
pub struct EsignJobs {
    stores: Stores,
    email: Arc<dyn EmailProvider>,
    tokens: Option<Arc<dyn TokenService>>,
    artifacts: Arc<dyn ArtifactPipeline>,
    importer: Option<Arc<dyn GoogleImporter>>,
    metrics: Arc<dyn Metrics>,
    envelope: JobEnvelope,
    public_base_url: String,
}

/// Builder for [`EsignJobs`].
pub struct EsignJobsBuilder {
    stores: Stores,
    email: Arc<dyn EmailProvider>,
    tokens: Option<Arc<dyn TokenService>>,
    artifacts: Arc<dyn ArtifactPipeline>,
    importer: Option<Arc<dyn GoogleImporter>>,
    metrics: Arc<dyn Metrics>,
    policy: RetryPolicy,
    public_base_url: String,
}

impl EsignJobsBuilder {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            email: Arc::new(DeterministicProvider::new()),
            tokens: None,
            artifacts: Arc::new(DeterministicArtifactPipeline::default()),
            importer: None,
            metrics: Arc::new(NoopMetrics),
            policy: RetryPolicy::default(),
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
        }
    }

    /// Email provider and public base URL from `config`.
    pub fn config(mut self, config: &EsignConfig) -> Self {
        self.email = email::provider_from_config(config);
        self.public_base_url = config.public_base_url.clone();
        self
    }

    pub fn email_provider(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.email = provider;
        self
    }

    pub fn token_service(mut self, tokens: Arc<dyn TokenService>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn artifact_pipeline(mut self, artifacts: Arc<dyn ArtifactPipeline>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn google_importer(mut self, importer: Arc<dyn GoogleImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn build(self) -> EsignJobs {
        let envelope = JobEnvelope::new(
            self.stores.job_runs.clone(),
            self.stores.audit.clone(),
            self.metrics.clone(),
            self.policy,
        );
        EsignJobs {
            stores: self.stores,
            email: self.email,
            tokens: self.tokens,
            artifacts: self.artifacts,
            importer: self.importer,
            metrics: self.metrics,
            envelope,
            public_base_url: self.public_base_url,
        }
    }
}

/// The three PDF jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactStep {
    RenderPages,
    Executed,
    Certificate,
}

impl ArtifactStep {
    fn job_name(self) -> &'static str {
        match self {
            Self::RenderPages => PDF_RENDER_PAGES,
            Self::Executed => PDF_GENERATE_EXECUTED,
            Self::Certificate => PDF_GENERATE_CERTIFICATE,
        }
    }

    /// Artifact already recorded on the agreement, used for replays.
    fn persisted(self, agreement: &Agreement) -> Option<ArtifactUpdate> {
        match self {
            Self::RenderPages => agreement.rendered_pages.map(ArtifactUpdate::RenderedPages),
            Self::Executed => agreement
                .executed_object_key
                .clone()
                .map(ArtifactUpdate::Executed),
            Self::Certificate => agreement
                .certificate_object_key
                .clone()
                .map(ArtifactUpdate::Certificate),
        }
    }
}

impl EsignJobs {
    pub fn builder(stores: Stores) -> EsignJobsBuilder {
        EsignJobsBuilder::new(stores)
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn metrics(&self) -> &Arc<dyn Metrics> {
        &self.metrics
    }

    pub fn envelope(&self) -> &JobEnvelope {
        &self.envelope
    }

    pub fn token_service(&self) -> Option<&Arc<dyn TokenService>> {
        self.tokens.as_ref()
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    // ------------------------------------------------------------------------
    // email_send_signing_request
    // ------------------------------------------------------------------------

    /// Send one templated email. Replays return the message id persisted by
    /// the first successful run without contacting the provider.
    #[instrument(
        skip_all,
        fields(
            job = EMAIL_SEND_SIGNING_REQUEST,
            agreement_id = %msg.agreement_id,
            recipient_id = %msg.recipient_id,
            notification = msg.notification.as_str(),
        )
    )]
    pub async fn send_signing_request(
        &self,
        ctx: &JobContext,
        msg: SendSigningRequest,
    ) -> Result<JobOutput<String>> {
        let template = msg.template().to_string();
        let correlation_id = resolve_correlation_id(
            msg.correlation_id.as_deref(),
            EMAIL_SEND_SIGNING_REQUEST,
            msg.dedupe_key.as_deref(),
            Some(msg.agreement_id.as_str()),
            Some(msg.recipient_id.as_str()),
        );
        let dedupe = non_empty(msg.dedupe_key.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| {
                dedupe_key(&[
                    msg.agreement_id.as_str(),
                    msg.recipient_id.as_str(),
                    template.as_str(),
                    msg.notification.as_str(),
                    correlation_id.as_str(),
                ])
            });
        let request = JobRequest {
            job_name: EMAIL_SEND_SIGNING_REQUEST,
            dedupe_key: dedupe,
            agreement_id: Some(msg.agreement_id.clone()),
            recipient_id: Some(msg.recipient_id.clone()),
            correlation_id: correlation_id.clone(),
            max_attempts: self.envelope.policy().resolve_max_attempts(msg.max_attempts),
        };

        let slot = self.envelope.begin(ctx, &request).await?;
        if !slot.should_run {
            let message_id = self
                .stores
                .email_logs
                .find_email_log_by_run(&ctx.scope, &slot.run.id)
                .await?
                .and_then(|log| log.provider_message_id);
            return Ok(JobOutput::deduplicated(slot.run, message_id));
        }
        let run = slot.run;

        let mut log = None;
        let sent = self
            .deliver(ctx, &msg, &run, &template, &correlation_id, &mut log)
            .await;

        // The provider accepted the message: from here on the run succeeds.
        if let (Ok(message_id), Some(log)) = (&sent, log.as_mut()) {
            log.status = EmailLogStatus::Sent;
            log.provider_message_id = Some(message_id.clone());
            log.failure_reason = None;
            log.next_retry_at = None;
            log.sent_at = Some(Utc::now());
            self.save_sent_log(ctx, &run, log).await;
        }

        match sent {
            Ok(message_id) => {
                let run = self.envelope.succeed(ctx, &run).await?;
                Ok(JobOutput::executed(run, message_id))
            }
            Err(e) => {
                let failed = self.envelope.fail(ctx, &run, &e).await;
                if let Some(log) = log.as_mut() {
                    self.record_email_failure(ctx, log, failed.as_ref(), &e).await;
                }
                Err(e)
            }
        }
    }

    /// Persist the `sent` email log, retrying the write once. A failure is
    /// logged and does not fail the run.
    async fn save_sent_log(&self, ctx: &JobContext, run: &JobRun, log: &EmailLog) {
        let mut saved = self.stores.email_logs.save_email_log(&ctx.scope, log).await;
        if let Err(e) = &saved {
            warn!(run_id = %run.id, error = %e, "Failed to save sent email log, retrying");
            saved = self.stores.email_logs.save_email_log(&ctx.scope, log).await;
        }
        if let Err(e) = saved {
            error!(
                run_id = %run.id,
                email_log_id = %log.id,
                message_id = ?log.provider_message_id,
                error = %e,
                "Email sent but its log could not be saved"
            );
        }
    }

    /// Create or reuse the run's email log, mint links and call the provider.
    async fn deliver(
        &self,
        ctx: &JobContext,
        msg: &SendSigningRequest,
        run: &JobRun,
        template: &str,
        correlation_id: &str,
        log: &mut Option<EmailLog>,
    ) -> Result<String> {
        let mut current = match self
            .stores
            .email_logs
            .find_email_log_by_run(&ctx.scope, &run.id)
            .await?
        {
            Some(existing) => existing,
            None => {
                self.stores
                    .email_logs
                    .create_email_log(
                        &ctx.scope,
                        NewEmailLog {
                            job_run_id: run.id.clone(),
                            agreement_id: msg.agreement_id.clone(),
                            recipient_id: msg.recipient_id.clone(),
                            template_code: template.to_string(),
                            correlation_id: correlation_id.to_string(),
                            max_attempts: run.max_attempts,
                        },
                    )
                    .await?
            }
        };
        current.attempt_count = run.attempt_count;
        *log = Some(current);

        let agreement = self
            .stores
            .agreements
            .require_agreement(&ctx.scope, &msg.agreement_id)
            .await?;
        let recipient = agreement
            .recipient(&msg.recipient_id)
            .cloned()
            .ok_or_else(|| EsignError::not_found("recipient", &msg.recipient_id))?;

        let (sign_url, completion_url) = match msg.notification {
            Notification::CompletionPackage => (None, Some(self.completion_url(ctx, msg).await?)),
            Notification::Invitation | Notification::Reminder => {
                (Some(self.sign_url(ctx, msg).await?), None)
            }
        };

        let input = EmailInput {
            template_code: template.to_string(),
            notification: msg.notification,
            agreement_id: agreement.id.clone(),
            agreement_title: agreement.title.clone(),
            recipient,
            correlation_id: correlation_id.to_string(),
            sign_url,
            completion_url,
        };
        self.email.send(ctx, &input).await
    }

    async fn sign_url(&self, ctx: &JobContext, msg: &SendSigningRequest) -> Result<String> {
        let token = match non_empty(msg.sign_token.as_deref()) {
            Some(token) => token.to_string(),
            None => {
                self.require_tokens()?
                    .issue(ctx, &msg.agreement_id, &msg.recipient_id, TokenPurpose::Sign)
                    .await?
            }
        };
        Ok(links::sign_link(&self.public_base_url, &token))
    }

    /// A supplied URL must be a tokenized completion link; anything else
    /// (object keys, asset paths) is rejected.
    async fn completion_url(&self, ctx: &JobContext, msg: &SendSigningRequest) -> Result<String> {
        if let Some(url) = non_empty(msg.completion_url.as_deref()) {
            if !url.ends_with("/complete") || links::token_from_link(url).is_none() {
                return Err(EsignError::Validation {
                    field: "completion_url".to_string(),
                    message: "must be a tokenized /sign/<token>/complete link".to_string(),
                });
            }
            return Ok(url.to_string());
        }
        let token = match non_empty(msg.completion_token.as_deref()) {
            Some(token) => token.to_string(),
            None => {
                self.require_tokens()?
                    .issue(
                        ctx,
                        &msg.agreement_id,
                        &msg.recipient_id,
                        TokenPurpose::Completion,
                    )
                    .await?
            }
        };
        Ok(links::completion_link(&self.public_base_url, &token))
    }

    async fn record_email_failure(
        &self,
        ctx: &JobContext,
        log: &mut EmailLog,
        failed: Option<&JobRun>,
        cause: &EsignError,
    ) {
        let retrying = failed.is_some_and(|run| run.status == JobRunStatus::Retrying);
        log.status = if retrying {
            EmailLogStatus::Retrying
        } else {
            EmailLogStatus::Failed
        };
        log.failure_reason = Some(cause.to_string());
        log.next_retry_at = failed.and_then(|run| run.next_retry_at);

        if let Err(e) = self.stores.email_logs.save_email_log(&ctx.scope, log).await {
            error!(email_log_id = %log.id, error = %e, "Failed to record email failure");
        }
    }

    fn require_tokens(&self) -> Result<&Arc<dyn TokenService>> {
        self.tokens
            .as_ref()
            .ok_or_else(|| EsignError::missing("token service"))
    }

    // ------------------------------------------------------------------------
    // PDF jobs
    // ------------------------------------------------------------------------

    /// Render the signed pages; returns the page count.
    pub async fn render_pages(&self, ctx: &JobContext, msg: ArtifactJob) -> Result<JobOutput<u32>> {
        let output = self.run_artifact(ctx, msg, ArtifactStep::RenderPages).await?;
        Ok(map_output(output, |update| match update {
            ArtifactUpdate::RenderedPages(pages) => Some(pages),
            _ => None,
        }))
    }

    /// Produce the executed PDF; returns its object key.
    pub async fn generate_executed(
        &self,
        ctx: &JobContext,
        msg: ArtifactJob,
    ) -> Result<JobOutput<String>> {
        let output = self.run_artifact(ctx, msg, ArtifactStep::Executed).await?;
        Ok(map_output(output, |update| match update {
            ArtifactUpdate::Executed(key) => Some(key),
            _ => None,
        }))
    }

    /// Produce the certificate of completion; returns its object key.
    pub async fn generate_certificate(
        &self,
        ctx: &JobContext,
        msg: ArtifactJob,
    ) -> Result<JobOutput<String>> {
        let output = self.run_artifact(ctx, msg, ArtifactStep::Certificate).await?;
        Ok(map_output(output, |update| match update {
            ArtifactUpdate::Certificate(key) => Some(key),
            _ => None,
        }))
    }

    #[instrument(skip_all, fields(job = step.job_name(), agreement_id = %msg.agreement_id))]
    async fn run_artifact(
        &self,
        ctx: &JobContext,
        msg: ArtifactJob,
        step: ArtifactStep,
    ) -> Result<JobOutput<ArtifactUpdate>> {
        let job_name = step.job_name();
        let correlation_id = resolve_correlation_id(
            msg.correlation_id.as_deref(),
            job_name,
            msg.dedupe_key.as_deref(),
            Some(msg.agreement_id.as_str()),
            None,
        );
        let request = JobRequest {
            job_name,
            dedupe_key: non_empty(msg.dedupe_key.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    dedupe_key(&[msg.agreement_id.as_str(), correlation_id.as_str()])
                }),
            agreement_id: Some(msg.agreement_id.clone()),
            recipient_id: None,
            correlation_id,
            max_attempts: self.envelope.policy().resolve_max_attempts(msg.max_attempts),
        };

        let slot = self.envelope.begin(ctx, &request).await?;
        if !slot.should_run {
            let persisted = self
                .stores
                .agreements
                .get_agreement(&ctx.scope, &msg.agreement_id)
                .await?
                .and_then(|agreement| step.persisted(&agreement));
            return Ok(JobOutput::deduplicated(slot.run, persisted));
        }
        let run = slot.run;

        let produced = async {
            let agreement = self
                .stores
                .agreements
                .require_agreement(&ctx.scope, &msg.agreement_id)
                .await?;
            let update = match step {
                ArtifactStep::RenderPages => ArtifactUpdate::RenderedPages(
                    self.artifacts.render_pages(ctx, &agreement).await?,
                ),
                ArtifactStep::Executed => ArtifactUpdate::Executed(
                    self.artifacts.generate_executed(ctx, &agreement).await?,
                ),
                ArtifactStep::Certificate => ArtifactUpdate::Certificate(
                    self.artifacts.generate_certificate(ctx, &agreement).await?,
                ),
            };
            Ok::<_, EsignError>(update)
        }
        .await;

        // The artifact exists in storage: from here on the run succeeds.
        if let Ok(update) = &produced {
            self.save_artifact(ctx, &run, &msg.agreement_id, update).await;
        }
        self.settle(ctx, run, produced).await
    }

    /// Record a produced artifact on its agreement, retrying the write once.
    /// A failure is logged and does not fail the run.
    async fn save_artifact(
        &self,
        ctx: &JobContext,
        run: &JobRun,
        agreement_id: &str,
        update: &ArtifactUpdate,
    ) {
        let agreements = &self.stores.agreements;
        let mut saved = agreements
            .set_artifact(&ctx.scope, agreement_id, update.clone())
            .await;
        if let Err(e) = &saved {
            warn!(run_id = %run.id, error = %e, "Failed to record artifact, retrying");
            saved = agreements
                .set_artifact(&ctx.scope, agreement_id, update.clone())
                .await;
        }
        if let Err(e) = saved {
            error!(
                run_id = %run.id,
                agreement_id,
                update = ?update,
                error = %e,
                "Artifact produced but not recorded on its agreement"
            );
        }
    }

    // ------------------------------------------------------------------------
    // token_rotate
    // ------------------------------------------------------------------------

    /// Rotate a recipient token; returns the new raw token. Earlier tokens
    /// stay valid when rotation fails.
    #[instrument(
        skip_all,
        fields(
            job = TOKEN_ROTATE,
            agreement_id = %msg.agreement_id,
            recipient_id = %msg.recipient_id,
        )
    )]
    pub async fn rotate_token(
        &self,
        ctx: &JobContext,
        msg: RotateToken,
    ) -> Result<JobOutput<String>> {
        let tokens = self.require_tokens()?.clone();
        let correlation_id = resolve_correlation_id(
            msg.correlation_id.as_deref(),
            TOKEN_ROTATE,
            msg.dedupe_key.as_deref(),
            Some(msg.agreement_id.as_str()),
            Some(msg.recipient_id.as_str()),
        );
        let request = JobRequest {
            job_name: TOKEN_ROTATE,
            dedupe_key: non_empty(msg.dedupe_key.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    dedupe_key(&[
                        msg.agreement_id.as_str(),
                        msg.recipient_id.as_str(),
                        msg.purpose.as_str(),
                        correlation_id.as_str(),
                    ])
                }),
            agreement_id: Some(msg.agreement_id.clone()),
            recipient_id: Some(msg.recipient_id.clone()),
            correlation_id,
            max_attempts: self.envelope.policy().resolve_max_attempts(msg.max_attempts),
        };

        let slot = self.envelope.begin(ctx, &request).await?;
        if !slot.should_run {
            return Ok(JobOutput::deduplicated(slot.run, None));
        }

        let rotated = tokens
            .rotate(ctx, &msg.agreement_id, &msg.recipient_id, msg.purpose)
            .await;
        self.settle(ctx, slot.run, rotated).await
    }

    // ------------------------------------------------------------------------
    // google_drive_import
    // ------------------------------------------------------------------------

    /// Import a Google Drive file as a document. Replays of the same
    /// `user_id|google_file_id` return no value and do not contact Google.
    #[instrument(
        skip_all,
        fields(job = GOOGLE_DRIVE_IMPORT, user_id = %msg.user_id, google_file_id = %msg.google_file_id)
    )]
    pub async fn import_google_drive(
        &self,
        ctx: &JobContext,
        msg: GoogleDriveImport,
    ) -> Result<JobOutput<Document>> {
        let importer = self
            .importer
            .clone()
            .ok_or_else(|| EsignError::missing("google importer"))?;
        let dedupe = dedupe_key(&[msg.user_id.as_str(), msg.google_file_id.as_str()]);
        let correlation_id = resolve_correlation_id(
            msg.correlation_id.as_deref(),
            GOOGLE_DRIVE_IMPORT,
            Some(dedupe.as_str()),
            msg.agreement_id.as_deref(),
            None,
        );
        let request = JobRequest {
            job_name: GOOGLE_DRIVE_IMPORT,
            dedupe_key: dedupe,
            agreement_id: msg.agreement_id.clone(),
            recipient_id: None,
            correlation_id,
            max_attempts: self.envelope.policy().resolve_max_attempts(msg.max_attempts),
        };

        let slot = self.envelope.begin(ctx, &request).await?;
        if !slot.should_run {
            return Ok(JobOutput::deduplicated(slot.run, None));
        }

        let imported = async {
            let file = importer
                .import_document(ctx, &msg.user_id, &msg.google_file_id)
                .await?;
            self.stores
                .documents
                .insert_document(
                    &ctx.scope,
                    Document {
                        id: Uuid::new_v4().to_string(),
                        user_id: msg.user_id.clone(),
                        google_file_id: msg.google_file_id.clone(),
                        title: file.title,
                        mime_type: file.mime_type,
                        size_bytes: file.size_bytes,
                        agreement_id: msg.agreement_id.clone(),
                        created_at: Utc::now(),
                    },
                )
                .await
        }
        .await;

        self.settle(ctx, slot.run, imported).await
    }

    /// Steps 5 and 6 of the envelope for jobs without dependent records.
    async fn settle<T>(
        &self,
        ctx: &JobContext,
        run: JobRun,
        outcome: Result<T>,
    ) -> Result<JobOutput<T>> {
        match outcome {
            Ok(value) => {
                let run = self.envelope.succeed(ctx, &run).await?;
                Ok(JobOutput::executed(run, value))
            }
            Err(e) => {
                self.envelope.fail(ctx, &run, &e).await;
                Err(e)
            }
        }
    }
}

fn map_output<T>(
    output: JobOutput<ArtifactUpdate>,
    extract: impl FnOnce(ArtifactUpdate) -> Option<T>,
) -> JobOutput<T> {
    JobOutput {
        run: output.run,
        value: output.value.and_then(extract),
        deduplicated: output.deduplicated,
    }
}
