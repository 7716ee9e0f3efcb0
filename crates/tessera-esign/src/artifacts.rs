// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! External collaborators of the PDF and import jobs.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::context::JobContext;
use crate::error::{EsignError, Result};
use crate::model::Agreement;

/// Renders signed pages and produces the executed and certificate PDFs.
#[async_trait]
pub trait ArtifactPipeline: Send + Sync {
    /// Render the signed pages; returns the page count.
    async fn render_pages(&self, ctx: &JobContext, agreement: &Agreement) -> Result<u32>;

    /// Burn signatures in; returns the object key of the executed PDF.
    async fn generate_executed(&self, ctx: &JobContext, agreement: &Agreement) -> Result<String>;

    /// Produce the certificate of completion; returns its object key.
    async fn generate_certificate(&self, ctx: &JobContext, agreement: &Agreement)
    -> Result<String>;
}

/// Pipeline that writes nothing and derives keys from the agreement id.
#[derive(Debug, Clone)]
pub struct DeterministicArtifactPipeline {
    pub pages_per_agreement: u32,
}

impl Default for DeterministicArtifactPipeline {
    fn default() -> Self {
        Self {
            pages_per_agreement: 1,
        }
    }
}

/// Object key of an agreement artifact.
pub fn object_key(scope_tenant: &str, agreement_id: &str, artifact: &str) -> String {
    if scope_tenant.is_empty() {
        format!("agreements/{}/{}.pdf", agreement_id, artifact)
    } else {
        format!("{}/agreements/{}/{}.pdf", scope_tenant, agreement_id, artifact)
    }
}

#[async_trait]
impl ArtifactPipeline for DeterministicArtifactPipeline {
    async fn render_pages(&self, ctx: &JobContext, _agreement: &Agreement) -> Result<u32> {
        ctx.check()?;
        Ok(self.pages_per_agreement)
    }

    async fn generate_executed(&self, ctx: &JobContext, agreement: &Agreement) -> Result<String> {
        ctx.check()?;
        Ok(object_key(&ctx.scope.tenant_id, &agreement.id, "executed"))
    }

    async fn generate_certificate(
        &self,
        ctx: &JobContext,
        agreement: &Agreement,
    ) -> Result<String> {
        ctx.check()?;
        Ok(object_key(&ctx.scope.tenant_id, &agreement.id, "certificate"))
    }
}

/// A file fetched from Google Drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFile {
    pub title: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Fetches documents from Google Drive on behalf of a user.
#[async_trait]
pub trait GoogleImporter: Send + Sync {
    async fn import_document(
        &self,
        ctx: &JobContext,
        user_id: &str,
        google_file_id: &str,
    ) -> Result<ImportedFile>;
}

/// Importer serving a fixed set of files. Unknown ids are `NOT_FOUND`.
#[derive(Debug, Clone, Default)]
pub struct StaticGoogleImporter {
    files: HashMap<String, ImportedFile>,
}

impl StaticGoogleImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, google_file_id: impl Into<String>, file: ImportedFile) -> Self {
        self.files.insert(google_file_id.into(), file);
        self
    }
}

#[async_trait]
impl GoogleImporter for StaticGoogleImporter {
    async fn import_document(
        &self,
        ctx: &JobContext,
        _user_id: &str,
        google_file_id: &str,
    ) -> Result<ImportedFile> {
        ctx.check()?;
        self.files
            .get(google_file_id)
            .cloned()
            .ok_or_else(|| EsignError::not_found("google file", google_file_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic_keys() {
        let pipeline = DeterministicArtifactPipeline::default();
        let ctx = JobContext::for_scope("t1", "o1");
        let agreement = Agreement::draft("a1", "NDA");

        assert_eq!(pipeline.render_pages(&ctx, &agreement).await.unwrap(), 1);
        assert_eq!(
            pipeline.generate_executed(&ctx, &agreement).await.unwrap(),
            "t1/agreements/a1/executed.pdf"
        );
        assert_eq!(object_key("", "a1", "certificate"), "agreements/a1/certificate.pdf");
    }

    #[tokio::test]
    async fn test_static_importer() {
        let importer = StaticGoogleImporter::new().with_file(
            "g1",
            ImportedFile {
                title: "Lease.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
                size_bytes: 2048,
            },
        );
        let ctx = JobContext::for_scope("t1", "o1");

        let file = importer.import_document(&ctx, "u1", "g1").await.unwrap();
        assert_eq!(file.title, "Lease.pdf");
        let err = importer.import_document(&ctx, "u1", "g2").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
