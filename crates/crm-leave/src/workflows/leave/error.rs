use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::access::IdentityError;

use super::domain::{LeaveStatus, LeaveType};
use super::repository::RepositoryError;

/// Policy rule a request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("no active {leave_type} policy for {year}")]
    PolicyNotFound { leave_type: LeaveType, year: i32 },
    #[error("requires {required} days notice, request gives {provided}")]
    InsufficientNotice { required: i32, provided: i32 },
    #[error("at most {allowed} consecutive days allowed, {requested} requested")]
    ExceedsConsecutiveLimit { allowed: i32, requested: i32 },
}

impl PolicyViolation {
    pub fn rule(&self) -> &'static str {
        match self {
            PolicyViolation::PolicyNotFound { .. } => "policy_not_found",
            PolicyViolation::InsufficientNotice { .. } => "insufficient_notice",
            PolicyViolation::ExceedsConsecutiveLimit { .. } => "exceeds_consecutive_limit",
        }
    }
}

/// Failure taxonomy for every leave workflow operation.
#[derive(Debug, thiserror::Error)]
pub enum LeaveError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("insufficient balance: {remaining} days remaining, {requested} requested")]
    InsufficientBalance { remaining: i32, requested: i32 },
    #[error("requested dates overlap an existing leave request")]
    OverlappingLeave,
    #[error("not permitted")]
    Forbidden,
    #[error("cannot {action} a request in status {status}")]
    InvalidTransition {
        status: LeaveStatus,
        action: &'static str,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("identity lookup failed: {0}")]
    Identity(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LeaveError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::Validation(_) => StatusCode::BAD_REQUEST,
            LeaveError::Policy(_) | LeaveError::InsufficientBalance { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LeaveError::OverlappingLeave | LeaveError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            LeaveError::Forbidden => StatusCode::FORBIDDEN,
            LeaveError::NotFound(_) => StatusCode::NOT_FOUND,
            LeaveError::Unauthorized => StatusCode::UNAUTHORIZED,
            LeaveError::Identity(_) | LeaveError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RepositoryError> for LeaveError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(what) => LeaveError::NotFound(what),
            other => LeaveError::Storage(other.to_string()),
        }
    }
}

impl From<IdentityError> for LeaveError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::InvalidToken => LeaveError::Unauthorized,
            IdentityError::UnknownUser(_) => LeaveError::Forbidden,
            IdentityError::Unavailable(reason) => LeaveError::Identity(reason),
        }
    }
}

impl IntoResponse for LeaveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = match &self {
            LeaveError::Policy(violation) => json!({
                "error": self.to_string(),
                "rule": violation.rule(),
            }),
            LeaveError::InsufficientBalance {
                remaining,
                requested,
            } => json!({
                "error": self.to_string(),
                "remaining": remaining,
                "requested": requested,
            }),
            LeaveError::Identity(_) | LeaveError::Storage(_) => json!({ "error": "internal error" }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(payload)).into_response()
    }
}
