use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dbhub_dispatch::DispatchError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Metadata(#[from] dbhub_metadata::MetadataError),

    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type HostResult<T> = Result<T, HostError>;

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    error: &'static str,
    message: String,
}

impl HostError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            HostError::Dispatch(DispatchError::PermissionDenied) => {
                (StatusCode::FORBIDDEN, "permission_denied")
            }
            HostError::Dispatch(DispatchError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            HostError::Dispatch(DispatchError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation")
            }
            HostError::Dispatch(DispatchError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            HostError::Dispatch(DispatchError::IntegrityFailure) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "integrity_failure")
            }
            HostError::Dispatch(DispatchError::JobQueueError { .. }) => {
                (StatusCode::BAD_REQUEST, "job_queue_error")
            }
            HostError::Dispatch(DispatchError::Transient(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "transient")
            }
            HostError::Dispatch(DispatchError::Fatal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "fatal")
            }
            HostError::Metadata(dbhub_metadata::MetadataError::PermissionDenied) => {
                (StatusCode::FORBIDDEN, "permission_denied")
            }
            HostError::Metadata(dbhub_metadata::MetadataError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            HostError::Metadata(dbhub_metadata::MetadataError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "validation")
            }
            HostError::Metadata(dbhub_metadata::MetadataError::Conflict(_)) => {
                (StatusCode::CONFLICT, "conflict")
            }
            HostError::Metadata(dbhub_metadata::MetadataError::Transient(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "transient")
            }
            HostError::InvalidAddress(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_address"),
            HostError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io"),
            HostError::Serde(_) => (StatusCode::BAD_REQUEST, "serde"),
            HostError::Anyhow(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let body = ErrorBody {
            status: status.as_u16(),
            error: kind,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
