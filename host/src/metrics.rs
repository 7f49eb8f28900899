//! Request metrics (SPEC_FULL.md §2 ambient stack), registered against the
//! default Prometheus registry the way the teacher's `metrics` crate
//! registers its counters, and gathered at `/metrics` the way
//! `host/src/server/api/metrics.rs` does in the teacher.

use std::time::Duration;

use axum::http::StatusCode;
use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, HistogramVec};

lazy_static! {
    pub static ref HTTP_REQUEST_COUNT: Counter =
        register_counter!("dbhub_http_request_count", "the number of HTTP requests served").unwrap();
    pub static ref HTTP_REQUEST_FAILED_COUNT: Counter = register_counter!(
        "dbhub_http_request_failed_count",
        "the number of HTTP requests that returned an error status"
    )
    .unwrap();
    pub static ref API_KEY_REQUEST_COUNT: CounterVec = register_counter_vec!(
        "dbhub_api_key_request_count",
        "the number of requests made under each API key",
        &["api_key"]
    )
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION_MILLIS: HistogramVec = register_histogram_vec!(
        "dbhub_http_request_duration_millis",
        "the duration of an HTTP request handled by the dispatch API",
        &["path"]
    )
    .unwrap();
}

/// Single entry point called once per request from
/// [`crate::server::logging::api_key_logging_middleware`].
pub fn record_request(path: &str, api_key: &str, status: StatusCode, duration: Duration) {
    HTTP_REQUEST_COUNT.inc();
    if status.is_client_error() || status.is_server_error() {
        HTTP_REQUEST_FAILED_COUNT.inc();
    }
    API_KEY_REQUEST_COUNT.with_label_values(&[api_key]).inc();
    HTTP_REQUEST_DURATION_MILLIS
        .with_label_values(&[path])
        .observe(duration.as_millis() as f64);
}
