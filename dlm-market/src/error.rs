//! Error types for dlm-market
//!
//! `MarketError` is what every core operation returns. Each variant maps to
//! one stable `ErrorKind` plus a finer-grained `code()`, and carries a
//! human-readable reason. `ApiError` adapts it to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::DatasetStatus;
use crate::signer::SignerError;

/// Stable error categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InvalidInput,
    Forbidden,
    Conflict,
    DatasetInactive,
    NothingToClaim,
    DependencyFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::DatasetInactive => "DATASET_INACTIVE",
            ErrorKind::NothingToClaim => "NOTHING_TO_CLAIM",
            ErrorKind::DependencyFailure => "DEPENDENCY_FAILURE",
        }
    }
}

/// Core operation error
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Settlement {0} is not pending")]
    NotPending(Uuid),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid label '{label}'. Allowed: {}", .allowed.join(", "))]
    InvalidLabel { label: String, allowed: Vec<String> },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot verify your own label")]
    SelfVerification,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Verifier {verifier_id} has already voted on item {item_id}")]
    DuplicateVote { item_id: Uuid, verifier_id: Uuid },

    #[error("Dataset {dataset_id} is no longer active ({status})")]
    DatasetInactive {
        dataset_id: Uuid,
        status: DatasetStatus,
    },

    #[error("No earnings to claim")]
    NothingToClaim,

    #[error("Claim signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Common error: {0}")]
    Common(#[from] dlm_common::Error),

    /// Persisted data violates a domain invariant
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for core operations
pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::NotFound { .. } => ErrorKind::NotFound,
            MarketError::InvalidState(_) | MarketError::NotPending(_) => ErrorKind::InvalidState,
            MarketError::InvalidInput(_) | MarketError::InvalidLabel { .. } => ErrorKind::InvalidInput,
            MarketError::Forbidden(_) | MarketError::SelfVerification => ErrorKind::Forbidden,
            MarketError::Conflict(_) | MarketError::DuplicateVote { .. } => ErrorKind::Conflict,
            MarketError::DatasetInactive { .. } => ErrorKind::DatasetInactive,
            MarketError::NothingToClaim => ErrorKind::NothingToClaim,
            MarketError::Signing(_)
            | MarketError::Database(_)
            | MarketError::Common(_)
            | MarketError::Corrupt(_) => ErrorKind::DependencyFailure,
        }
    }

    /// Fine-grained stable code
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::NotPending(_) => "NOT_PENDING",
            MarketError::InvalidLabel { .. } => "INVALID_LABEL",
            MarketError::SelfVerification => "SELF_VERIFICATION",
            MarketError::DuplicateVote { .. } => "DUPLICATE_VOTE",
            MarketError::Signing(_) => "SIGNING_FAILED",
            MarketError::Database(_) => "PERSISTENCE_FAILED",
            MarketError::Corrupt(_) => "CORRUPT_RECORD",
            other => other.kind().as_str(),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Core operation rejected or failed
    #[error(transparent)]
    Market(#[from] MarketError),

    /// Caller identity missing or malformed (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, code, message) = match &self {
            ApiError::Market(err) => {
                let status = match err.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::InvalidState => StatusCode::CONFLICT,
                    ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::DatasetInactive => StatusCode::CONFLICT,
                    ErrorKind::NothingToClaim => StatusCode::BAD_REQUEST,
                    ErrorKind::DependencyFailure => StatusCode::SERVICE_UNAVAILABLE,
                };
                if status == StatusCode::SERVICE_UNAVAILABLE {
                    tracing::error!(code = err.code(), "Dependency failure: {}", err);
                }
                (status, err.kind().as_str(), err.code(), err.to_string())
            }
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "UNAUTHORIZED",
                msg.clone(),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::InvalidInput.as_str(),
                "BAD_REQUEST",
                msg.clone(),
            ),
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(MarketError::SelfVerification.kind(), ErrorKind::Forbidden);
        assert_eq!(
            MarketError::DuplicateVote {
                item_id: Uuid::nil(),
                verifier_id: Uuid::nil()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(MarketError::NotPending(Uuid::nil()).kind(), ErrorKind::InvalidState);
        assert_eq!(MarketError::NothingToClaim.kind(), ErrorKind::NothingToClaim);
        assert_eq!(
            MarketError::Signing(SignerError::NotConfigured).kind(),
            ErrorKind::DependencyFailure
        );
        assert_eq!(
            MarketError::Common(dlm_common::Error::Config("bad".into())).kind(),
            ErrorKind::DependencyFailure
        );
        assert_eq!(MarketError::Corrupt("x".into()).kind(), ErrorKind::DependencyFailure);
    }

    #[test]
    fn test_codes_are_specific() {
        assert_eq!(MarketError::SelfVerification.code(), "SELF_VERIFICATION");
        assert_eq!(MarketError::NotPending(Uuid::nil()).code(), "NOT_PENDING");
        assert_eq!(MarketError::InvalidState("x".into()).code(), "INVALID_STATE");
        assert_eq!(MarketError::not_found("Item", 7).code(), "NOT_FOUND");
    }

    #[test]
    fn test_invalid_label_message_lists_allowed() {
        let err = MarketError::InvalidLabel {
            label: "bird".into(),
            allowed: vec!["cat".into(), "dog".into()],
        };
        assert_eq!(err.to_string(), "Invalid label 'bird'. Allowed: cat, dog");
    }

    #[test]
    fn test_api_error_status_codes() {
        let response = ApiError::from(MarketError::SelfVerification).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ApiError::from(MarketError::not_found("Item", "x")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Unauthorized("no identity".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
