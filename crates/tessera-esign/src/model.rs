// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! E-sign entities: agreements, recipients, job runs, email logs, audit
//! events and imported documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// Agreements
// ============================================================================

/// Agreement lifecycle: `draft → sent → completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    #[default]
    Draft,
    Sent,
    Completed,
}

impl AgreementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether `self → next` is a lifecycle step.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Sent) | (Self::Sent, Self::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

/// Signers drive completion; CCs receive the finished package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientRole {
    #[default]
    Signer,
    Cc,
}

/// A party to an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: RecipientRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

impl Recipient {
    pub fn signer(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role: RecipientRole::Signer,
            signed_at: None,
        }
    }

    pub fn cc(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            role: RecipientRole::Cc,
            ..Self::signer(id, name, email)
        }
    }
}

/// An agreement and its artifact slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: AgreementStatus,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    /// Pages rendered by `pdf_render_pages`.
    #[serde(default)]
    pub rendered_pages: Option<u32>,
    /// Populated by `pdf_generate_executed` after success only.
    #[serde(default)]
    pub executed_object_key: Option<String>,
    /// Populated by `pdf_generate_certificate` after success only.
    #[serde(default)]
    pub certificate_object_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Agreement {
    /// A draft agreement.
    pub fn draft(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            status: AgreementStatus::Draft,
            recipients: Vec::new(),
            rendered_pages: None,
            executed_object_key: None,
            certificate_object_key: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn with_recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn with_status(mut self, status: AgreementStatus) -> Self {
        self.status = status;
        if status == AgreementStatus::Completed {
            self.completed_at = Some(self.updated_at);
        }
        self
    }

    pub fn recipient(&self, id: &str) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.id == id)
    }

    pub fn cc_recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.recipients
            .iter()
            .filter(|r| r.role == RecipientRole::Cc)
    }
}

/// Draft edits. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipients: Option<Vec<Recipient>>,
}

/// Artifact written by a PDF job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactUpdate {
    RenderedPages(u32),
    Executed(String),
    Certificate(String),
}

// ============================================================================
// Job runs
// ============================================================================

/// JobRun lifecycle: `queued → running → succeeded | failed | retrying`,
/// `retrying → running` on the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Retrying,
}

impl JobRunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }

    /// Whether a new attempt may start from this status.
    pub fn can_retry(self) -> bool {
        matches!(self, Self::Failed | Self::Retrying)
    }
}

/// One deduplicated job execution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRun {
    pub id: String,
    pub job_name: String,
    pub dedupe_key: String,
    pub agreement_id: Option<String>,
    pub recipient_id: Option<String>,
    pub correlation_id: String,
    pub status: JobRunStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input of `begin_job_run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunStart {
    pub job_name: String,
    pub dedupe_key: String,
    pub agreement_id: Option<String>,
    pub recipient_id: Option<String>,
    pub correlation_id: String,
    pub max_attempts: u32,
}

/// Result of `begin_job_run`: the authoritative record and whether the
/// caller owns this attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunSlot {
    pub run: JobRun,
    pub should_run: bool,
}

// ============================================================================
// Email logs
// ============================================================================

/// Mirrors the job run status, plus `queued` before the first send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailLogStatus {
    Queued,
    Sent,
    Failed,
    Retrying,
}

impl EmailLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            "retrying" => Some(Self::Retrying),
            _ => None,
        }
    }
}

/// Delivery record of one templated email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailLog {
    pub id: String,
    /// Job run that owns this delivery.
    pub job_run_id: String,
    pub agreement_id: String,
    pub recipient_id: String,
    pub template_code: String,
    pub status: EmailLogStatus,
    pub provider_message_id: Option<String>,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub correlation_id: String,
    pub failure_reason: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input of `create_email_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmailLog {
    pub job_run_id: String,
    pub agreement_id: String,
    pub recipient_id: String,
    pub template_code: String,
    pub correlation_id: String,
    pub max_attempts: u32,
}

// ============================================================================
// Audit events
// ============================================================================

/// Audit event types written by the job envelope.
pub mod audit_types {
    pub const JOB_SUCCEEDED: &str = "job.succeeded";
    pub const JOB_FAILED: &str = "job.failed";
    pub const AGREEMENT_COMPLETED: &str = "agreement.completed";
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub id: String,
    pub agreement_id: Option<String>,
    pub event_type: String,
    pub actor_type: String,
    pub metadata_json: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Parsed metadata; `Null` if the stored JSON is unreadable.
    pub fn metadata(&self) -> JsonValue {
        serde_json::from_str(&self.metadata_json).unwrap_or(JsonValue::Null)
    }
}

/// Input of `append_audit_event`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub agreement_id: Option<String>,
    pub event_type: String,
    pub actor_type: String,
    pub metadata: JsonValue,
}

// ============================================================================
// Documents
// ============================================================================

/// A document imported from Google Drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub google_file_id: String,
    pub title: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub agreement_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
