//! HTTP error types for the `Firma` server.
//!
//! Maps domain errors from `firma-core` into appropriate HTTP responses.
//! Every error variant produces a JSON body with a machine-readable `error`
//! field and a human-readable `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use firma_core::error::{AssignmentError, ResolveError, SignatureError, WorkflowError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// The acting user may not perform the operation.
    Forbidden(String),
    /// Requested resource not found.
    NotFound(String),
    /// Client sent malformed input.
    BadRequest(String),
    /// The request conflicts with the current ledger state.
    Conflict(String),
    /// Well-formed input rejected by a domain rule.
    Unprocessable {
        /// Stable machine-readable code.
        code: &'static str,
        /// Text suitable for the end user.
        message: String,
        /// Diagnostic detail (measured values, limits).
        detail: Option<String>,
    },
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, detail) = match self {
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            Self::Unprocessable {
                code,
                message,
                detail,
            } => (StatusCode::UNPROCESSABLE_ENTITY, code, message, detail),
            Self::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg,
                None,
            ),
        };

        let body = ErrorBody {
            error: error_type,
            message,
            detail,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        let kind = err.kind();
        Self::Unprocessable {
            code: kind.code(),
            message: kind.user_message().to_owned(),
            detail: Some(err.to_string()),
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        Self::Unprocessable {
            code: "unresolvable_responsibility",
            message: err.to_string(),
            detail: None,
        }
    }
}

impl From<AssignmentError> for AppError {
    fn from(err: AssignmentError) -> Self {
        match err {
            AssignmentError::DuplicateSignatory { .. } => Self::Conflict(err.to_string()),
            AssignmentError::UnknownSignatory { .. } => Self::NotFound(err.to_string()),
            AssignmentError::Incomplete { .. } => Self::Unprocessable {
                code: "incomplete_assignment",
                message: err.to_string(),
                detail: None,
            },
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::ActorMismatch { .. } => Self::Forbidden(err.to_string()),
            WorkflowError::RoleSelectionRequired { .. } | WorkflowError::RoleNotPending { .. } => {
                Self::Conflict(err.to_string())
            }
            WorkflowError::MissingEvidence { .. } => Self::BadRequest(err.to_string()),
        }
    }
}
