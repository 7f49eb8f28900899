// Copyright (c) 2024 Taiko Labs
// Licensed and distributed under either of
//   * MIT license (license terms in the root directory or at http://opensource.org/licenses/MIT).
//   * Apache v2 license (license terms in the root directory or at http://www.apache.org/licenses/LICENSE-2.0).
// at your option. This file may not be copied, modified, or distributed except according to those terms.

//! In-memory `MetadataStore` fake, mirroring the teacher's
//! `InMemoryTaskManager` so the rest of the core is testable without a live
//! Postgres instance.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dbhub_types::{Access, Branch, Commit};
use tokio::sync::RwLock;

use crate::error::{MetadataError, MetadataResult};
use crate::store::MetadataStore;
use crate::types::{BlobLocation, LiveDbRecord, QueryLogId};

#[derive(Debug, Clone)]
struct DbRecord {
    access: Access,
    default_commit: Option<String>,
    branches: Vec<Branch>,
    default_branch: Option<String>,
    commits: Vec<Commit>,
    tags: Vec<String>,
    releases: Vec<String>,
    live: Option<LiveDbRecord>,
}

impl Default for DbRecord {
    fn default() -> Self {
        Self {
            access: Access::Private,
            default_commit: None,
            branches: Vec::new(),
            default_branch: None,
            commits: Vec::new(),
            tags: Vec::new(),
            releases: Vec::new(),
            live: None,
        }
    }
}

#[derive(Debug)]
struct State {
    dbs: HashMap<(String, String), DbRecord>,
    next_log_id: QueryLogId,
}

/// A process-local `MetadataStore` backed by a `HashMap`. Every database is
/// implicitly public and owned by whoever calls `live_add_database_pg`
/// first; permission checks beyond that are test scaffolding, not policy.
#[derive(Debug, Clone)]
pub struct InMemoryMetadataStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                dbs: HashMap::new(),
                next_log_id: 1,
            })),
        }
    }

    fn key(owner: &str, name: &str) -> (String, String) {
        (owner.to_string(), name.to_string())
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn check_db_permissions(
        &self,
        _viewer: &str,
        owner: &str,
        name: &str,
        _write_intent: bool,
    ) -> MetadataResult<bool> {
        let state = self.state.read().await;
        Ok(state.dbs.contains_key(&Self::key(owner, name)))
    }

    async fn minio_location(
        &self,
        owner: &str,
        name: &str,
        _commit_id: Option<&str>,
        _viewer: &str,
    ) -> MetadataResult<BlobLocation> {
        let state = self.state.read().await;
        let record = state
            .dbs
            .get(&Self::key(owner, name))
            .ok_or_else(|| MetadataError::NotFound(format!("{owner}/{name}")))?;
        let commit_id = record
            .default_commit
            .clone()
            .ok_or_else(|| MetadataError::NotFound("no default commit".to_string()))?;
        let address = dbhub_types::BlobAddress::from_sha256(&commit_id)
            .ok_or_else(|| MetadataError::Validation("malformed commit id".to_string()))?;
        Ok(BlobLocation {
            bucket: address.bucket,
            object: address.object,
            last_modified: Utc::now(),
        })
    }

    async fn default_commit(&self, owner: &str, name: &str) -> MetadataResult<String> {
        let state = self.state.read().await;
        state
            .dbs
            .get(&Self::key(owner, name))
            .and_then(|r| r.default_commit.clone())
            .ok_or_else(|| MetadataError::NotFound(format!("{owner}/{name}")))
    }

    async fn get_branches(&self, owner: &str, name: &str) -> MetadataResult<Vec<Branch>> {
        let state = self.state.read().await;
        Ok(state
            .dbs
            .get(&Self::key(owner, name))
            .map(|r| r.branches.clone())
            .unwrap_or_default())
    }

    async fn get_default_branch_name(&self, owner: &str, name: &str) -> MetadataResult<String> {
        let state = self.state.read().await;
        state
            .dbs
            .get(&Self::key(owner, name))
            .and_then(|r| r.default_branch.clone())
            .ok_or_else(|| MetadataError::NotFound(format!("{owner}/{name}")))
    }

    async fn store_branches(&self, owner: &str, name: &str, branches: &[Branch]) -> MetadataResult<()> {
        let mut state = self.state.write().await;
        let record = state.dbs.entry(Self::key(owner, name)).or_default();
        record.branches = branches.to_vec();
        Ok(())
    }

    async fn get_commit_list(&self, owner: &str, name: &str) -> MetadataResult<Vec<Commit>> {
        let state = self.state.read().await;
        Ok(state
            .dbs
            .get(&Self::key(owner, name))
            .map(|r| r.commits.clone())
            .unwrap_or_default())
    }

    async fn store_commits(&self, owner: &str, name: &str, commits: &[Commit]) -> MetadataResult<()> {
        let mut state = self.state.write().await;
        let record = state.dbs.entry(Self::key(owner, name)).or_default();
        for commit in commits {
            if record.default_commit.is_none() {
                record.default_commit = Some(commit.id.clone());
            }
            record.commits.push(commit.clone());
        }
        Ok(())
    }

    async fn get_tags(&self, owner: &str, name: &str) -> MetadataResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .dbs
            .get(&Self::key(owner, name))
            .map(|r| r.tags.clone())
            .unwrap_or_default())
    }

    async fn store_tags(&self, owner: &str, name: &str, tags: &[String]) -> MetadataResult<()> {
        let mut state = self.state.write().await;
        state.dbs.entry(Self::key(owner, name)).or_default().tags = tags.to_vec();
        Ok(())
    }

    async fn get_releases(&self, owner: &str, name: &str) -> MetadataResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .dbs
            .get(&Self::key(owner, name))
            .map(|r| r.releases.clone())
            .unwrap_or_default())
    }

    async fn store_releases(&self, owner: &str, name: &str, releases: &[String]) -> MetadataResult<()> {
        let mut state = self.state.write().await;
        state.dbs.entry(Self::key(owner, name)).or_default().releases = releases.to_vec();
        Ok(())
    }

    async fn live_add_database_pg(
        &self,
        owner: &str,
        name: &str,
        blob_id: &str,
        node_name: &str,
        access: Access,
    ) -> MetadataResult<()> {
        let mut state = self.state.write().await;
        let record = state.dbs.entry(Self::key(owner, name)).or_default();
        record.access = access;
        record.default_commit = Some(blob_id.to_string());
        record.live = Some(LiveDbRecord {
            owner: owner.to_string(),
            name: name.to_string(),
            node_name: node_name.to_string(),
            access,
            last_modified: Utc::now(),
        });
        Ok(())
    }

    async fn update_modified(&self, owner: &str, name: &str) -> MetadataResult<()> {
        let mut state = self.state.write().await;
        if let Some(record) = state.dbs.get_mut(&Self::key(owner, name)) {
            if let Some(live) = record.live.as_mut() {
                live.last_modified = Utc::now();
            }
        }
        Ok(())
    }

    async fn log_sqlite_query_before(
        &self,
        _owner: &str,
        _name: &str,
        _requesting_user: &str,
        _sql: &str,
    ) -> MetadataResult<QueryLogId> {
        let mut state = self.state.write().await;
        let id = state.next_log_id;
        state.next_log_id += 1;
        Ok(id)
    }

    async fn log_sqlite_query_after(
        &self,
        _log_id: QueryLogId,
        _mem_used: i64,
        _mem_highwater: i64,
    ) -> MetadataResult<()> {
        Ok(())
    }

    async fn get_live_db(&self, owner: &str, name: &str) -> MetadataResult<LiveDbRecord> {
        let state = self.state.read().await;
        state
            .dbs
            .get(&Self::key(owner, name))
            .and_then(|r| r.live.clone())
            .ok_or_else(|| MetadataError::NotFound(format!("{owner}/{name}")))
    }

    async fn list_live_dbs_on_node(&self, node_name: &str) -> MetadataResult<Vec<LiveDbRecord>> {
        let state = self.state.read().await;
        Ok(state
            .dbs
            .values()
            .filter_map(|r| r.live.clone())
            .filter(|l| l.node_name == node_name)
            .collect())
    }

    async fn delete_live_db(&self, owner: &str, name: &str) -> MetadataResult<()> {
        let mut state = self.state.write().await;
        if let Some(record) = state.dbs.get_mut(&Self::key(owner, name)) {
            record.live = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn live_db_roundtrip() {
        let store = InMemoryMetadataStore::new();
        store
            .live_add_database_pg("alice", "widgets", &"a".repeat(64), "node1", Access::Public)
            .await
            .unwrap();

        let record = store.get_live_db("alice", "widgets").await.unwrap();
        assert_eq!(record.node_name, "node1");

        let on_node = store.list_live_dbs_on_node("node1").await.unwrap();
        assert_eq!(on_node.len(), 1);

        store.delete_live_db("alice", "widgets").await.unwrap();
        assert!(store.get_live_db("alice", "widgets").await.is_err());
    }

    #[tokio::test]
    async fn commits_seed_default_commit_once() {
        let store = InMemoryMetadataStore::new();
        let commit_a = Commit {
            id: "a".repeat(64),
            parent: None,
            other_parents: vec![],
            author_name: "a".to_string(),
            author_email: "a@example.com".to_string(),
            committer_name: None,
            committer_email: None,
            message: "first".to_string(),
            timestamp: 0,
            tree: dbhub_types::Tree { entries: vec![] },
        };
        store.store_commits("alice", "widgets", &[commit_a.clone()]).await.unwrap();
        assert_eq!(store.default_commit("alice", "widgets").await.unwrap(), commit_a.id);
    }
}
