//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps reconciliation and store errors to HTTP status codes and JSON bodies
//! of the form `{"error": {"code", "message", "details"?}}`.
//!
//! Internal error details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use topup_core::ValidationError;
use topup_reconcile::{ReconcileError, StoreError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Position and field of an invalid rule spec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// A rule spec failed validation (422, with `{index, field}` details).
    #[error("validation error: {0}")]
    InvalidRule(ValidationError),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The wallet is being reconciled by another request (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Optional backend not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::InvalidRule(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InvalidRule(v) => Some(serde_json::json!({
                "index": v.index,
                "field": v.field,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::WalletNotFound(_) | ReconcileError::RuleNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            ReconcileError::Validation(v) => Self::InvalidRule(v),
            ReconcileError::ConcurrencyConflict(_) => Self::Conflict(err.to_string()),
            ReconcileError::Collaborator(msg) => Self::Internal(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WalletNotFound(_) | StoreError::RuleNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            StoreError::Conflict(_) => Self::Conflict(err.to_string()),
            StoreError::Backend(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use topup_core::WalletId;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[test]
    fn reconcile_errors_map_to_statuses() {
        let w = WalletId::new();
        let status = |e: ReconcileError| AppError::from(e).status_and_code().0;
        assert_eq!(status(ReconcileError::WalletNotFound(w)), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ReconcileError::RuleNotFound { identity: "x".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ReconcileError::ConcurrencyConflict(w)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ReconcileError::Collaborator("db down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(ReconcileError::Validation(ValidationError::new(0, "trigger", "is required"))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn invalid_rule_carries_index_and_field() {
        let err = AppError::InvalidRule(ValidationError::new(2, "interval", "is required"));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body.error.details,
            Some(serde_json::json!({"index": 2, "field": "interval"}))
        );
        assert!(body.error.message.contains("recurring_transaction_rules[2].interval"));
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn collaborator_failure_is_hidden() {
        let err = AppError::from(ReconcileError::Collaborator("password=hunter2".into()));
        let (_, body) = response_parts(err).await;
        assert!(!body.error.message.contains("hunter2"));
    }

    #[test]
    fn error_body_omits_empty_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "NOT_FOUND".into(),
                message: "gone".into(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("details"));
    }
}
