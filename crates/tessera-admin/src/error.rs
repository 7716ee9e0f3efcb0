// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for tessera-admin.
//!
//! Every error carries a stable taxonomy code and an [`ErrorKind`] that
//! decides the HTTP status of the `{error: {code, message}}` envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Result type using AdminError.
pub type Result<T> = std::result::Result<T, AdminError>;

/// Error kinds shared by every tessera component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Descriptor or input violates its declared contract.
    Validation,
    /// No identity could be resolved for the request.
    Unauthenticated,
    /// The authorizer denied the action.
    Forbidden,
    /// Addressed entity is missing.
    NotFound,
    /// Operation attempted on a terminal entity.
    Immutability,
    /// Duplicate registration or key.
    Conflict,
    /// Retryable external failure.
    Transient,
    /// Job attempts exhausted.
    TerminalJobFailure,
    /// Caller cancelled the operation.
    Cancellation,
    /// A collaborator was not configured.
    DependencyMissing,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// HTTP status for this kind.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Immutability | Self::Conflict => StatusCode::CONFLICT,
            Self::Transient | Self::TerminalJobFailure => StatusCode::BAD_GATEWAY,
            // 499 is the de-facto "client closed request" status.
            Self::Cancellation => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::DependencyMissing | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Admin errors.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum AdminError {
    /// Panel descriptors contradict each other.
    #[error("Panel '{panel}' is invalid: {message}")]
    PanelValidation {
        /// Panel slug (or builder name when not yet registered).
        panel: String,
        /// What is wrong.
        message: String,
    },

    /// A panel with this slug is already registered.
    #[error("Panel '{slug}' is already registered")]
    PanelDuplicate {
        /// The duplicated slug.
        slug: String,
    },

    /// The panel builder has no repository bound.
    #[error("Panel '{panel}' has no repository")]
    PanelRepositoryMissing {
        /// Panel slug.
        panel: String,
    },

    /// A dashboard widget payload broke the canonical widget contract.
    #[error("Widget '{widget}' violates the widget contract: {message}")]
    WidgetContractViolation {
        /// Widget code.
        widget: String,
        /// What is wrong.
        message: String,
    },

    /// Request input failed validation.
    #[error("Validation error for '{field}': {message}")]
    InvalidInput {
        /// Offending field.
        field: String,
        /// What is wrong.
        message: String,
    },

    /// Entity not found.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity kind (panel, record, command...).
        entity: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// A registrar already holds an entry under this key.
    #[error("{registry} already has an entry named '{key}'")]
    DuplicateRegistration {
        /// Registry name.
        registry: &'static str,
        /// Duplicated key.
        key: String,
    },

    /// `initialize` was called on an initialized admin.
    #[error("Admin is already initialized")]
    AlreadyInitialized,

    /// Registration attempted after `initialize`.
    #[error("Admin registrations are closed after initialization")]
    RegistrationClosed,

    /// No authenticated identity.
    #[error("Authentication required")]
    Unauthenticated,

    /// The authorizer denied the action.
    #[error("Not allowed to '{action}' on '{resource}'")]
    Forbidden {
        /// Action token.
        action: String,
        /// Resource name.
        resource: String,
    },

    /// A required collaborator is not configured.
    #[error("Dependencies not configured: {dependency}")]
    DependenciesNotConfigured {
        /// Missing dependency.
        dependency: String,
    },

    /// The caller cancelled the request.
    #[error("Operation cancelled")]
    Cancelled,

    /// Error surfaced by an external collaborator with its own code.
    #[error("{message}")]
    External {
        /// Taxonomy kind.
        kind: ErrorKind,
        /// Taxonomy code (e.g. `AGREEMENT_IMMUTABLE`).
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdminError {
    /// Shorthand for a validation error on an input field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a missing entity.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Get the taxonomy code for this error.
    pub fn error_code(&self) -> &str {
        match self {
            Self::PanelValidation { .. } => "PANEL_VALIDATION",
            Self::PanelDuplicate { .. } => "PANEL_DUPLICATE",
            Self::PanelRepositoryMissing { .. } => "PANEL_REPOSITORY_MISSING",
            Self::WidgetContractViolation { .. } => "WIDGET_CONTRACT_VIOLATION",
            Self::InvalidInput { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DuplicateRegistration { .. } => "DUPLICATE_REGISTRATION",
            Self::AlreadyInitialized => "ADMIN_ALREADY_INITIALIZED",
            Self::RegistrationClosed => "REGISTRATION_CLOSED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::DependenciesNotConfigured { .. } => "DEPENDENCIES_NOT_CONFIGURED",
            Self::Cancelled => "CANCELLED",
            Self::External { code, .. } => code.as_str(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PanelValidation { .. }
            | Self::WidgetContractViolation { .. }
            | Self::InvalidInput { .. } => ErrorKind::Validation,
            Self::PanelRepositoryMissing { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PanelDuplicate { .. }
            | Self::DuplicateRegistration { .. }
            | Self::AlreadyInitialized
            | Self::RegistrationClosed => ErrorKind::Conflict,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::DependenciesNotConfigured { .. } => ErrorKind::DependencyMissing,
            Self::Cancelled => ErrorKind::Cancellation,
            Self::External { kind, .. } => *kind,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status derived from the kind.
    pub fn http_status(&self) -> StatusCode {
        self.kind().http_status()
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(err: serde_json::Error) -> Self {
        AdminError::invalid("body", err.to_string())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });
        (self.http_status(), Json(body)).into_response()
    }
}
