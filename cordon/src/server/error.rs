//! Boundary error type: every refusal and failure maps to a stable kind
//! string plus an HTTP status. Child exit codes never reach this type;
//! they travel in success bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cordon_browser::BrowserError;
use cordon_files::FileOpError;
use cordon_policy::PolicyError;
use cordon_scaffold::ScaffoldError;
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "InvalidRequest", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "kind": self.kind,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

fn policy_status(err: &PolicyError) -> StatusCode {
    match err {
        PolicyError::PathTraversal(_) => StatusCode::BAD_REQUEST,
        PolicyError::Critical(_)
        | PolicyError::SystemDirectory(_)
        | PolicyError::Credential(_)
        | PolicyError::CommandBlocked { .. }
        | PolicyError::CommandNotAllowed(_) => StatusCode::FORBIDDEN,
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        Self::new(policy_status(&err), err.kind(), err.to_string())
    }
}

impl From<FileOpError> for ApiError {
    fn from(err: FileOpError) -> Self {
        Self::from_file_ref(&err)
    }
}

impl From<ScaffoldError> for ApiError {
    fn from(err: ScaffoldError) -> Self {
        let status = match &err {
            ScaffoldError::UnknownTemplate(_) => StatusCode::NOT_FOUND,
            ScaffoldError::ProjectExists(_) => StatusCode::CONFLICT,
            ScaffoldError::InvalidName(_) => StatusCode::BAD_REQUEST,
            ScaffoldError::File(e) => return Self::from_file_ref(e),
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl ApiError {
    fn from_file_ref(err: &FileOpError) -> Self {
        let status = match err {
            FileOpError::Policy(p) => policy_status(p),
            FileOpError::Exists(_) => StatusCode::CONFLICT,
            FileOpError::Missing(_) => StatusCode::NOT_FOUND,
            FileOpError::Protected(_) => StatusCode::FORBIDDEN,
            FileOpError::NotDirectory(_) => StatusCode::BAD_REQUEST,
            FileOpError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            FileOpError::InvalidBulkPayload(_) => StatusCode::BAD_REQUEST,
            FileOpError::Backup(_) | FileOpError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<BrowserError> for ApiError {
    fn from(err: BrowserError) -> Self {
        let status = match &err {
            BrowserError::Closed => StatusCode::CONFLICT,
            BrowserError::Driver(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(err.to_string())
    }
}
