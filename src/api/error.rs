use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::records::SourceError;
use crate::workflows::WorkflowError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing or unknown bearer token")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    /// Request that axum could not extract; keeps the extractor's status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Workflow(e) => match e {
                WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
                WorkflowError::Validation { .. } => StatusCode::BAD_REQUEST,
                WorkflowError::InvalidTransition { .. } => StatusCode::CONFLICT,
                WorkflowError::Permission { .. } => StatusCode::FORBIDDEN,
                WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
                WorkflowError::Source(source) => source_status(source),
                WorkflowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Source(source) => source_status(source),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::BadRequest(_) | ApiError::Rejected { .. } => "bad_request",
            ApiError::Workflow(WorkflowError::Source(SourceError::UnknownColumn(_))) => {
                "unknown_column"
            }
            ApiError::Workflow(e) => e.kind(),
            ApiError::Source(SourceError::UnknownColumn(_)) => "unknown_column",
            ApiError::Source(_) => "source_unavailable",
        }
    }
}

macro_rules! rejection_into_api_error {
    ($($rejection:ty),+) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    ApiError::Rejected {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )+
    };
}

rejection_into_api_error!(PathRejection, QueryRejection, JsonRejection);

fn source_status(source: &SourceError) -> StatusCode {
    match source {
        SourceError::UnknownColumn(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error.kind = self.kind(), "Request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_errors_map_to_statuses() {
        let cases = [
            (
                WorkflowError::NotFound {
                    record_id: 1,
                    detail: String::new(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                WorkflowError::Validation {
                    reason: String::new(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                WorkflowError::InvalidTransition {
                    record_id: 1,
                    from: "WON".to_string(),
                    to: "NEW".to_string(),
                    reason: String::new(),
                },
                StatusCode::CONFLICT,
            ),
            (
                WorkflowError::Permission {
                    actor: "carol".to_string(),
                    record_id: 1,
                    to: "NEW".to_string(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                WorkflowError::Conflict {
                    record_id: 1,
                    expected: 1,
                    found: 2,
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_unknown_column_is_not_found() {
        let err = ApiError::from(SourceError::UnknownColumn("Planet".to_string()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "unknown_column");

        let err = ApiError::from(WorkflowError::Source(SourceError::UnknownColumn(
            "Planet".to_string(),
        )));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "unknown_column");
    }

    #[test]
    fn test_rejections_keep_their_status() {
        let err = ApiError::Rejected {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: "Expected request with `Content-Type: application/json`".to_string(),
        };
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.kind(), "bad_request");
    }
}
