use axum::{http::StatusCode, response::IntoResponse};

/// Liveness probe. Doesn't touch the job queue or metadata store; a node
/// that can't answer this is dead, not just backed up.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}
