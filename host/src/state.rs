use std::sync::Arc;
use std::time::Duration;

use dbhub_dispatch::Dispatcher;

use crate::error::{HostError, HostResult};

/// Shared axum state: the dispatch API plus the bits the HTTP layer needs
/// that `Dispatcher` itself has no opinion about (which node to target, how
/// long to wait for a response).
#[derive(Clone)]
pub struct DbHubState {
    pub dispatcher: Arc<Dispatcher>,
    pub metadata: Arc<dyn dbhub_metadata::MetadataStore>,
    pub default_node: String,
    pub wait_timeout: Duration,
}

impl DbHubState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        metadata: Arc<dyn dbhub_metadata::MetadataStore>,
        default_node: String,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            metadata,
            default_node,
            wait_timeout,
        }
    }

    /// Resolves the node that actually owns `owner/name`'s live database,
    /// falling back to `default_node` if the metadata store has no record
    /// yet (e.g. a `createdb` still in flight in this demo's single-node
    /// setup).
    pub async fn target_node(&self, owner: &str, name: &str) -> HostResult<String> {
        match self.metadata.get_live_db(owner, name).await {
            Ok(record) => Ok(record.node_name),
            Err(dbhub_metadata::MetadataError::NotFound(_)) => Ok(self.default_node.clone()),
            Err(e) => Err(HostError::from(e)),
        }
    }
}
