pub mod dbhub;
pub mod health;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::server::auth::{api_key_auth_middleware, ApiKeyStore};
use crate::server::logging::{api_key_logging_middleware, AsyncRequestLogger};
use crate::state::DbHubState;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn create_router(
    state: Arc<DbHubState>,
    concurrency_limit: usize,
    api_key_store: Arc<ApiKeyStore>,
    request_logger: Arc<AsyncRequestLogger>,
) -> Router {
    let dbhub_routes = Router::new()
        .route("/:owner/:name/query", post(dbhub::query))
        .route("/:owner/:name/execute", post(dbhub::execute))
        .route("/:owner/:name/tables", get(dbhub::tables))
        .route("/:owner/:name/views", get(dbhub::views))
        .route("/:owner/:name/columns/:table", get(dbhub::columns))
        .route("/:owner/:name/indexes", get(dbhub::indexes))
        .route("/:owner/:name/size", get(dbhub::size))
        .route("/:owner/:name/createdb", post(dbhub::create_db))
        .route("/:owner/:name", delete(dbhub::delete))
        .route("/:owner/:name/backup", post(dbhub::backup))
        .route("/:owner/:name/rowdata/:table", get(dbhub::row_data))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            api_key_store.clone(),
            api_key_auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            request_logger.clone(),
            api_key_logging_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics))
        .nest("/v1", dbhub_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::new(Duration::from_secs(60)))
                .concurrency_limit(concurrency_limit),
        )
}
