// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! E-sign job orchestration.
//!
//! Every job kind runs inside the same envelope ([`JobEnvelope`]):
//!
//! 1. resolve a deterministic correlation id
//! 2. compute the dedupe key (message value or a `|`-joined default)
//! 3. `begin_job_run`: only the owner of the dedupe slot executes
//! 4. run the job-specific side effect
//! 5. success: persist dependent state, mark succeeded, count, audit
//! 6. failure: schedule `next_retry_at` (`base_delay * 2^(attempt-1)`)
//!    while attempts remain, mark retrying or failed, count, audit, and
//!    return the original error
//!
//! | Job | Default dedupe key |
//! |-----|--------------------|
//! | `email_send_signing_request` | `agreement|recipient|template|notification|correlation` |
//! | `pdf_render_pages` and the other PDF jobs | `agreement|correlation` |
//! | `token_rotate` | `agreement|recipient|purpose|correlation` |
//! | `google_drive_import` | `user|google_file` |

mod envelope;
mod handlers;

pub use self::envelope::{JobEnvelope, JobRequest};
pub use self::handlers::{EsignJobs, EsignJobsBuilder};

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::email::Notification;
use crate::model::JobRun;
use crate::tokens::TokenPurpose;

pub const EMAIL_SEND_SIGNING_REQUEST: &str = "email_send_signing_request";
pub const PDF_RENDER_PAGES: &str = "pdf_render_pages";
pub const PDF_GENERATE_EXECUTED: &str = "pdf_generate_executed";
pub const PDF_GENERATE_CERTIFICATE: &str = "pdf_generate_certificate";
pub const TOKEN_ROTATE: &str = "token_rotate";
pub const GOOGLE_DRIVE_IMPORT: &str = "google_drive_import";

/// Every job kind.
pub const ALL_JOBS: &[&str] = &[
    EMAIL_SEND_SIGNING_REQUEST,
    PDF_RENDER_PAGES,
    PDF_GENERATE_EXECUTED,
    PDF_GENERATE_CERTIFICATE,
    TOKEN_ROTATE,
    GOOGLE_DRIVE_IMPORT,
];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// Retry policy
// ============================================================================

/// Exponential backoff between attempts of one job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Attempts including the first. Zero means [`DEFAULT_MAX_ATTEMPTS`].
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Message override, then policy value, then the default of 3.
    pub fn resolve_max_attempts(&self, message_override: Option<u32>) -> u32 {
        message_override
            .filter(|n| *n > 0)
            .or(Some(self.max_attempts).filter(|n| *n > 0))
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    /// Delay after the given attempt (1-indexed): `base * 2^(attempt-1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier)
    }

    /// When the next attempt may start, or `None` once attempts are
    /// exhausted.
    pub fn next_retry_at(
        &self,
        now: DateTime<Utc>,
        attempt_count: u32,
        max_attempts: u32,
    ) -> Option<DateTime<Utc>> {
        if attempt_count >= max_attempts {
            return None;
        }
        let delay = chrono::Duration::from_std(self.delay_for_attempt(attempt_count)).ok()?;
        now.checked_add_signed(delay)
    }
}

// ============================================================================
// Correlation and dedupe
// ============================================================================

/// The message's correlation id, or one derived from the identifying tuple
/// so that replays of the same job agree on it.
pub fn resolve_correlation_id(
    explicit: Option<&str>,
    job_name: &str,
    dedupe_key: Option<&str>,
    agreement_id: Option<&str>,
    recipient_id: Option<&str>,
) -> String {
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    let tuple = [
        job_name,
        dedupe_key.unwrap_or_default(),
        agreement_id.unwrap_or_default(),
        recipient_id.unwrap_or_default(),
    ]
    .join("|");
    let digest = Sha256::digest(tuple.as_bytes());
    format!("corr_{}", hex::encode(&digest[..8]))
}

/// `|`-joined dedupe key.
pub fn dedupe_key(parts: &[&str]) -> String {
    parts.join("|")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Messages
// ============================================================================

/// Send an invitation, reminder or completion package to one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSigningRequest {
    pub agreement_id: String,
    pub recipient_id: String,
    #[serde(default)]
    pub notification: Notification,
    /// Defaults per notification.
    #[serde(default)]
    pub template_code: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Existing sign token; one is issued when absent.
    #[serde(default)]
    pub sign_token: Option<String>,
    /// Existing completion token; one is issued when absent.
    #[serde(default)]
    pub completion_token: Option<String>,
    /// Pre-built completion link; skips token handling.
    #[serde(default)]
    pub completion_url: Option<String>,
}

impl SendSigningRequest {
    pub fn new(agreement_id: impl Into<String>, recipient_id: impl Into<String>) -> Self {
        Self {
            agreement_id: agreement_id.into(),
            recipient_id: recipient_id.into(),
            ..Self::default()
        }
    }

    pub fn notification(mut self, notification: Notification) -> Self {
        self.notification = notification;
        self
    }

    pub fn correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn template(&self) -> &str {
        non_empty(self.template_code.as_deref())
            .unwrap_or_else(|| self.notification.default_template())
    }
}

/// Input of the three PDF jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactJob {
    pub agreement_id: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl ArtifactJob {
    pub fn new(agreement_id: impl Into<String>) -> Self {
        Self {
            agreement_id: agreement_id.into(),
            ..Self::default()
        }
    }

    pub fn correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Rotate a recipient token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateToken {
    pub agreement_id: String,
    pub recipient_id: String,
    #[serde(default)]
    pub purpose: TokenPurpose,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Import one Google Drive file for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleDriveImport {
    pub user_id: String,
    pub google_file_id: String,
    #[serde(default)]
    pub agreement_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl GoogleDriveImport {
    pub fn new(user_id: impl Into<String>, google_file_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            google_file_id: google_file_id.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Result of one job call.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput<T> {
    /// The authoritative run record after this call.
    pub run: JobRun,
    /// Produced value. Replays carry the persisted value where one exists.
    pub value: Option<T>,
    /// `true` when the dedupe slot was already taken and nothing ran.
    pub deduplicated: bool,
}

impl<T> JobOutput<T> {
    pub fn executed(run: JobRun, value: T) -> Self {
        Self {
            run,
            value: Some(value),
            deduplicated: false,
        }
    }

    pub fn deduplicated(run: JobRun, value: Option<T>) -> Self {
        Self {
            run,
            value,
            deduplicated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_max_attempts_precedence() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 5);
        assert_eq!(policy.resolve_max_attempts(Some(2)), 2);
        assert_eq!(policy.resolve_max_attempts(None), 5);
        assert_eq!(policy.resolve_max_attempts(Some(0)), 5);

        let unset = RetryPolicy::new(Duration::from_secs(1), 0);
        assert_eq!(unset.resolve_max_attempts(None), DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_next_retry_at() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 3);
        let now = Utc::now();

        assert_eq!(
            policy.next_retry_at(now, 1, 3),
            Some(now + chrono::Duration::seconds(1))
        );
        assert_eq!(
            policy.next_retry_at(now, 2, 3),
            Some(now + chrono::Duration::seconds(2))
        );
        assert_eq!(policy.next_retry_at(now, 3, 3), None);
    }

    #[test]
    fn test_correlation_is_deterministic() {
        let a = resolve_correlation_id(None, TOKEN_ROTATE, None, Some("a1"), Some("s1"));
        let b = resolve_correlation_id(Some("  "), TOKEN_ROTATE, None, Some("a1"), Some("s1"));
        let c = resolve_correlation_id(None, TOKEN_ROTATE, None, Some("a1"), Some("s2"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("corr_"));
        assert_eq!(
            resolve_correlation_id(Some("corr-1"), TOKEN_ROTATE, None, None, None),
            "corr-1"
        );
    }

    #[test]
    fn test_message_defaults() {
        let msg: SendSigningRequest =
            serde_json::from_str(r#"{"agreement_id":"a1","recipient_id":"s1"}"#).unwrap();
        assert_eq!(msg.notification, Notification::Invitation);
        assert_eq!(msg.template(), "esign.signing_request");

        let completion = SendSigningRequest::new("a1", "cc1")
            .notification(Notification::CompletionPackage);
        assert_eq!(completion.template(), "esign.completed_delivery");
        assert_eq!(dedupe_key(&["u1", "g1"]), "u1|g1");
    }
}
