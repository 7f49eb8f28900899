pub mod api;
pub mod auth;
pub mod logging;

use std::{net::SocketAddr, str::FromStr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::HostError;
use crate::server::{auth::ApiKeyStore, logging::AsyncRequestLogger};
use crate::state::DbHubState;

/// Binds and serves the dispatch API's HTTP front end.
pub async fn serve(
    state: DbHubState,
    address: &str,
    concurrency_limit: usize,
    api_key_store: Arc<ApiKeyStore>,
    request_logger: Arc<AsyncRequestLogger>,
) -> anyhow::Result<()> {
    let addr =
        SocketAddr::from_str(address).map_err(|_| HostError::InvalidAddress(address.to_string()))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", listener.local_addr()?);

    let router = api::create_router(Arc::new(state), concurrency_limit, api_key_store, request_logger);
    axum::serve(listener, router)
        .await
        .context("server couldn't serve")?;
    Ok(())
}
