// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tessera E-Sign - Job Orchestration for Agreements
//!
//! This crate runs the background work behind e-signature agreements:
//! emails to signers and CCs, PDF artifacts, token rotation and Google Drive
//! imports. Every job kind shares one execution envelope with deduplicated
//! runs, exponential retry, correlation ids, metrics and an append-only
//! audit trail.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 tessera-admin (commands, jobs page, panels)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                │ CompleteAgreementCommand           │ AgreementRepository
//!                ▼                                    ▼
//! ┌──────────────────────────┐          ┌──────────────────────────────────┐
//! │   CompletionWorkflow     │─────────▶│            EsignJobs             │
//! │ render → executed →      │          │  JobEnvelope around six handlers │
//! │ certificate → CC fan-out │          └──────────────────────────────────┘
//! └──────────────────────────┘             │          │           │
//!                                          ▼          ▼           ▼
//!                                   EmailProvider  TokenService  ArtifactPipeline
//!                                   (deterministic,               GoogleImporter
//!                                    SMTP)
//!                                          │
//!                                          ▼
//!                         ┌────────────────────────────────────┐
//!                         │ Stores: memory or SQLite (sqlx)    │
//!                         │ job runs, email logs, audit events │
//!                         └────────────────────────────────────┘
//! ```
//!
//! # Job Kinds
//!
//! | Job | Side effect | Value |
//! |-----|-------------|-------|
//! | `email_send_signing_request` | Sends one templated email | provider message id |
//! | `pdf_render_pages` | Renders signed pages | page count |
//! | `pdf_generate_executed` | Burns in signatures | object key |
//! | `pdf_generate_certificate` | Certificate of completion | object key |
//! | `token_rotate` | Replaces a recipient token | new token |
//! | `google_drive_import` | Imports a Drive file | document |
//!
//! # Run Semantics
//!
//! A run is keyed by `(scope, job_name, dedupe_key)`. A succeeded run is
//! never executed again; a failed or retrying run is re-attempted with an
//! incremented `attempt_count`. Failures schedule
//! `next_retry_at = now + base_delay * 2^(attempt_count - 1)` while attempts
//! remain. `next_retry_at` is advisory: callers re-submit the message.
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ESIGN_PUBLIC_BASE_URL` | `http://localhost:8082` | Base of recipient links |
//! | `ESIGN_EMAIL_TRANSPORT` | `deterministic` | `deterministic`, `mock`, `smtp` or `mailpit` |
//! | `ESIGN_EMAIL_SMTP_HOST` | - | SMTP host (required for `smtp`) |
//! | `ESIGN_EMAIL_SMTP_PORT` | `587` | SMTP port |
//! | `ESIGN_EMAIL_SMTP_USERNAME` / `ESIGN_EMAIL_SMTP_PASSWORD` | - | AUTH PLAIN credentials |
//! | `ESIGN_EMAIL_FROM_NAME` / `ESIGN_EMAIL_FROM_ADDRESS` | `Tessera E-Sign` / `no-reply@localhost` | Sender |
//! | `ESIGN_EMAIL_SMTP_TIMEOUT_SECONDS` | `10` | Send timeout |
//! | `ESIGN_EMAIL_SMTP_DISABLE_STARTTLS` | `false` | Skip STARTTLS |
//! | `ESIGN_EMAIL_SMTP_INSECURE_TLS` | `false` | Accept invalid certificates |

/// Back-office integration: agreements repository, complete command, job status.
pub mod admin;

/// PDF pipeline and Google Drive importer collaborators.
pub mod artifacts;

/// Configuration loaded from environment variables.
pub mod config;

/// Scope and cancellation carried by every job call.
pub mod context;

/// Email providers, templates and recipient links.
pub mod email;

/// Error types with taxonomy codes.
pub mod error;

/// Execution envelope, retry policy and the six job handlers.
pub mod jobs;

/// Job counters.
pub mod metrics;

/// Embedded SQLite migrations.
pub mod migrations;

/// Agreements, runs, email logs, audit events and documents.
pub mod model;

/// Bounded worker queue.
pub mod queue;

/// Persistence traits and backends.
pub mod store;

/// Recipient-scoped link tokens.
pub mod tokens;

/// Post-completion workflow.
pub mod workflow;

pub use config::EsignConfig;
pub use context::JobContext;
pub use error::{EsignError, Result};
pub use jobs::{EsignJobs, JobOutput, RetryPolicy};
pub use queue::{AsyncQueue, QueueConfig, QueueHandler};
pub use store::Stores;
pub use workflow::{CompletionReport, CompletionWorkflow};
