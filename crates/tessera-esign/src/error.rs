// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for tessera-esign.
//!
//! Codes are shared with the admin error envelope; [`EsignError`] converts
//! into [`AdminError`] so esign failures surface through the same HTTP
//! mapping.

use tessera_admin::{AdminError, ErrorKind};
use thiserror::Error;

/// Result type using EsignError.
pub type Result<T> = std::result::Result<T, EsignError>;

/// Errors raised by the e-sign core.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum EsignError {
    /// A completed agreement was mutated.
    #[error("Agreement '{agreement_id}' is completed and cannot be changed")]
    AgreementImmutable { agreement_id: String },

    /// Audit events were updated or deleted.
    #[error("Audit events are append-only")]
    AuditEventsAppendOnly,

    /// The completion workflow ran on an agreement that is not completed.
    #[error("Agreement '{agreement_id}' is '{status}', completion requires 'completed'")]
    CompletionPrecondition {
        agreement_id: String,
        status: String,
    },

    /// An agreement status change outside the lifecycle.
    #[error("Agreement '{agreement_id}' cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        agreement_id: String,
        from: String,
        to: String,
    },

    /// A collaborator required by the operation is not wired.
    #[error("Dependencies not configured: {dependency}")]
    DependenciesNotConfigured { dependency: String },

    /// The async queue no longer accepts messages.
    #[error("Queue is closed")]
    QueueClosed,

    /// Addressed entity does not exist in the scope.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Input validation failed.
    #[error("Validation error for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Retryable failure of an external collaborator.
    #[error("{service} failed: {message}")]
    Transient { service: String, message: String },

    /// The caller's context was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Database operation failed.
    #[error("Database error during {operation}: {details}")]
    Database { operation: String, details: String },
}

impl EsignError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn missing(dependency: impl Into<String>) -> Self {
        Self::DependenciesNotConfigured {
            dependency: dependency.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AgreementImmutable { .. } => "AGREEMENT_IMMUTABLE",
            Self::AuditEventsAppendOnly => "AUDIT_EVENTS_APPEND_ONLY",
            Self::CompletionPrecondition { .. } => "COMPLETION_PRECONDITION",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::DependenciesNotConfigured { .. } => "DEPENDENCIES_NOT_CONFIGURED",
            Self::QueueClosed => "QUEUE_CLOSED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Transient { .. } => "TRANSIENT_FAILURE",
            Self::Cancelled => "CANCELLED",
            Self::Database { .. } => "DATABASE_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AgreementImmutable { .. } | Self::AuditEventsAppendOnly => {
                ErrorKind::Immutability
            }
            Self::CompletionPrecondition { .. } | Self::Validation { .. } => ErrorKind::Validation,
            Self::InvalidTransition { .. } | Self::QueueClosed => ErrorKind::Conflict,
            Self::DependenciesNotConfigured { .. } => ErrorKind::DependencyMissing,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Cancelled => ErrorKind::Cancellation,
            Self::Database { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a job may retry after this error. Other errors end the run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::Database { .. } | Self::Cancelled
        )
    }
}

impl From<sqlx::Error> for EsignError {
    fn from(err: sqlx::Error) -> Self {
        if err.to_string().contains("AUDIT_EVENTS_APPEND_ONLY") {
            return EsignError::AuditEventsAppendOnly;
        }
        EsignError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for EsignError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        EsignError::Database {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<EsignError> for AdminError {
    fn from(err: EsignError) -> Self {
        match err {
            EsignError::NotFound { entity, id } => AdminError::not_found(entity, id),
            EsignError::Validation { field, message } => AdminError::invalid(field, message),
            EsignError::DependenciesNotConfigured { dependency } => {
                AdminError::DependenciesNotConfigured { dependency }
            }
            EsignError::Cancelled => AdminError::Cancelled,
            other => AdminError::External {
                kind: other.kind(),
                code: other.error_code().to_string(),
                message: other.to_string(),
            },
        }
    }
}
