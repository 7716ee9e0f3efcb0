// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for tessera-esign integration tests.
//!
//! Provides scripted collaborators (email provider, artifact pipeline,
//! Google importer) and a `Harness` wiring them into `EsignJobs`.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tessera_esign::artifacts::{
    ArtifactPipeline, DeterministicArtifactPipeline, GoogleImporter, ImportedFile,
    StaticGoogleImporter,
};
use tessera_esign::email::{
    CapturingLinkObserver, DeterministicProvider, EmailInput, EmailProvider,
};
use tessera_esign::metrics::InMemoryMetrics;
use tessera_esign::model::{Agreement, AgreementStatus, Recipient};
use tessera_esign::tokens::InMemoryTokenService;
use tessera_esign::{
    CompletionWorkflow, EsignError, EsignJobs, JobContext, Result, RetryPolicy, Stores,
};

// ============================================================================
// Scripted email provider
// ============================================================================

/// Email provider that fails on a script, then delegates to the
/// deterministic provider.
pub struct ScriptedProvider {
    inner: DeterministicProvider,
    /// Number of initial sends that fail.
    fail_first: usize,
    /// Fail every send when set.
    always_fail: bool,
    /// Recipients whose sends always fail.
    failing_recipients: HashSet<String>,
    sends: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(observer: Arc<CapturingLinkObserver>) -> Self {
        Self {
            inner: DeterministicProvider::with_observer(observer),
            fail_first: 0,
            always_fail: false,
            failing_recipients: HashSet::new(),
            sends: AtomicUsize::new(0),
        }
    }

    pub fn fail_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn always_fail(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn fail_for(mut self, recipient_id: &str) -> Self {
        self.failing_recipients.insert(recipient_id.to_string());
        self
    }

    /// Calls made, failed or not.
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmailProvider for ScriptedProvider {
    async fn send(&self, ctx: &JobContext, input: &EmailInput) -> Result<String> {
        let call = self.sends.fetch_add(1, Ordering::SeqCst);
        if self.always_fail
            || call < self.fail_first
            || self.failing_recipients.contains(&input.recipient.id)
        {
            return Err(EsignError::transient("email", "connection reset by peer"));
        }
        self.inner.send(ctx, input).await
    }
}

// ============================================================================
// Counting artifact pipeline
// ============================================================================

/// Deterministic pipeline that counts calls and can fail the executed step.
#[derive(Default)]
pub struct CountingPipeline {
    inner: DeterministicArtifactPipeline,
    pub fail_executed: bool,
    pub renders: AtomicUsize,
    pub executed: AtomicUsize,
    pub certificates: AtomicUsize,
}

impl CountingPipeline {
    pub fn failing_executed() -> Self {
        Self {
            fail_executed: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ArtifactPipeline for CountingPipeline {
    async fn render_pages(&self, ctx: &JobContext, agreement: &Agreement) -> Result<u32> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.inner.render_pages(ctx, agreement).await
    }

    async fn generate_executed(&self, ctx: &JobContext, agreement: &Agreement) -> Result<String> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        if self.fail_executed {
            return Err(EsignError::transient("pdf", "renderer unavailable"));
        }
        self.inner.generate_executed(ctx, agreement).await
    }

    async fn generate_certificate(
        &self,
        ctx: &JobContext,
        agreement: &Agreement,
    ) -> Result<String> {
        self.certificates.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_certificate(ctx, agreement).await
    }
}

// ============================================================================
// Counting Google importer
// ============================================================================

pub struct CountingImporter {
    inner: StaticGoogleImporter,
    pub calls: AtomicUsize,
}

impl CountingImporter {
    pub fn with_file(google_file_id: &str, title: &str) -> Self {
        Self {
            inner: StaticGoogleImporter::new().with_file(
                google_file_id,
                ImportedFile {
                    title: title.to_string(),
                    mime_type: "application/pdf".to_string(),
                    size_bytes: 1024,
                },
            ),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GoogleImporter for CountingImporter {
    async fn import_document(
        &self,
        ctx: &JobContext,
        user_id: &str,
        google_file_id: &str,
    ) -> Result<ImportedFile> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.import_document(ctx, user_id, google_file_id).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub const BASE_URL: &str = "https://sign.example.com";

/// Jobs wired with in-memory stores and inspectable collaborators.
pub struct Harness {
    pub stores: Stores,
    pub jobs: EsignJobs,
    pub provider: Arc<ScriptedProvider>,
    pub observer: Arc<CapturingLinkObserver>,
    pub tokens: Arc<InMemoryTokenService>,
    pub metrics: Arc<InMemoryMetrics>,
    pub pipeline: Arc<CountingPipeline>,
    pub importer: Arc<CountingImporter>,
    pub ctx: JobContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|p| p, CountingPipeline::default())
    }

    /// Harness whose provider is customised by `script`.
    pub fn with(
        script: impl FnOnce(ScriptedProvider) -> ScriptedProvider,
        pipeline: CountingPipeline,
    ) -> Self {
        Self::with_stores(Stores::memory(), script, pipeline)
    }

    pub fn with_stores(
        stores: Stores,
        script: impl FnOnce(ScriptedProvider) -> ScriptedProvider,
        pipeline: CountingPipeline,
    ) -> Self {
        let observer = Arc::new(CapturingLinkObserver::new());
        let provider = Arc::new(script(ScriptedProvider::new(observer.clone())));
        let tokens = Arc::new(InMemoryTokenService::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let pipeline = Arc::new(pipeline);
        let importer = Arc::new(CountingImporter::with_file("g1", "Lease.pdf"));

        let jobs = EsignJobs::builder(stores.clone())
            .email_provider(provider.clone())
            .token_service(tokens.clone())
            .artifact_pipeline(pipeline.clone())
            .google_importer(importer.clone())
            .metrics(metrics.clone())
            .retry_policy(RetryPolicy::new(Duration::from_secs(1), 3))
            .public_base_url(BASE_URL)
            .build();

        Self {
            stores,
            jobs,
            provider,
            observer,
            tokens,
            metrics,
            pipeline,
            importer,
            ctx: JobContext::for_scope("tenant-1", "org-1"),
        }
    }

    pub fn workflow(&self) -> CompletionWorkflow {
        CompletionWorkflow::new(self.jobs.clone())
    }

    /// Insert `agreement` in the harness scope.
    pub async fn seed(&self, agreement: Agreement) -> Agreement {
        self.stores
            .agreements
            .insert_agreement(&self.ctx.scope, agreement)
            .await
            .expect("Failed to seed agreement")
    }
}

/// `a1` sent to signer `s1`.
pub fn sent_agreement(id: &str) -> Agreement {
    Agreement::draft(id, "Consulting Agreement")
        .with_recipient(Recipient::signer("s1", "Sam Signer", "sam@example.com"))
        .with_status(AgreementStatus::Sent)
}

/// Completed agreement with signer `s1` and the given CCs.
pub fn completed_agreement(id: &str, ccs: &[&str]) -> Agreement {
    ccs.iter().fold(
        Agreement::draft(id, "Consulting Agreement")
            .with_recipient(Recipient::signer("s1", "Sam Signer", "sam@example.com"))
            .with_status(AgreementStatus::Completed),
        |agreement, cc| {
            agreement.with_recipient(Recipient::cc(
                *cc,
                format!("CC {}", cc),
                format!("{}@example.com", cc),
            ))
        },
    )
}
