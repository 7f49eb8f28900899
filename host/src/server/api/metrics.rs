use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, TextEncoder};

/// Renders every registered counter/histogram as Prometheus text exposition
/// format, gathered from the default registry the `dbhub_*` metrics in
/// [`crate::metrics`] register themselves into.
pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
        return (StatusCode::INTERNAL_SERVER_ERROR, [(header::CONTENT_TYPE, "text/plain".to_string())], Vec::new());
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer)
}
