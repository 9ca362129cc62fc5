//! services/api/src/error.rs
//!
//! Defines the primary error type for the gateway service and its mapping to
//! HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use case_desk_core::{FlowError, PortError};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::ConfigError;

/// Structured error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// The primary error type for the gateway service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the workflow core.
    #[error("{0}")]
    Flow(#[from] FlowError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(e: PortError) -> Self {
        ApiError::Flow(FlowError::Port(e))
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                self.to_string(),
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Flow(flow) => flow_parts(flow),
            ApiError::Config(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                tracing::error!(error = %self, "Gateway internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

fn flow_parts(error: &FlowError) -> (StatusCode, &'static str, String) {
    match error {
        FlowError::Port(port) => port_parts(port),
        FlowError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION", e.to_string()),
        FlowError::Transition(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_TRANSITION",
            e.to_string(),
        ),
        FlowError::BankConfig(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_BANK_CONFIG",
            e.to_string(),
        ),
        FlowError::Forbidden(e) => (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string()),
        FlowError::DocumentNotOnCase { .. } => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", error.to_string())
        }
    }
}

/// Client errors from the backend pass through with their message; anything
/// else is reported as a bad gateway.
fn port_parts(error: &PortError) -> (StatusCode, &'static str, String) {
    match error {
        PortError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
        PortError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            "AUTH_REQUIRED",
            "The backend rejected the session token".to_string(),
        ),
        PortError::Rejected { status, message } => {
            let code = StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            tracing::warn!(backend_status = *status, message = %message, "Backend rejected request");
            (code, "BACKEND_REJECTED", message.clone())
        }
        PortError::Unexpected(detail) => {
            tracing::error!(detail = %detail, "Backend call failed");
            (
                StatusCode::BAD_GATEWAY,
                "BACKEND_UNAVAILABLE",
                "The lending backend could not be reached".to_string(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}
