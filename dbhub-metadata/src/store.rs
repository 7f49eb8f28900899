//! The `MetadataStore` trait (§4.7): the core's only view of the external
//! relational schema, modeled after the teacher's `IdStore`/`IdWrite` split
//! so a Postgres-backed implementation and an in-memory test double both
//! satisfy the same surface.

use async_trait::async_trait;
use dbhub_types::{Branch, Commit};

use crate::error::MetadataResult;
use crate::types::{BlobLocation, LiveDbRecord, QueryLogId};

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn check_db_permissions(
        &self,
        viewer: &str,
        owner: &str,
        name: &str,
        write_intent: bool,
    ) -> MetadataResult<bool>;

    async fn minio_location(
        &self,
        owner: &str,
        name: &str,
        commit_id: Option<&str>,
        viewer: &str,
    ) -> MetadataResult<BlobLocation>;

    async fn default_commit(&self, owner: &str, name: &str) -> MetadataResult<String>;

    async fn get_branches(&self, owner: &str, name: &str) -> MetadataResult<Vec<Branch>>;

    async fn get_default_branch_name(&self, owner: &str, name: &str) -> MetadataResult<String>;

    async fn store_branches(&self, owner: &str, name: &str, branches: &[Branch]) -> MetadataResult<()>;

    async fn get_commit_list(&self, owner: &str, name: &str) -> MetadataResult<Vec<Commit>>;

    async fn store_commits(&self, owner: &str, name: &str, commits: &[Commit]) -> MetadataResult<()>;

    async fn get_tags(&self, owner: &str, name: &str) -> MetadataResult<Vec<String>>;

    async fn store_tags(&self, owner: &str, name: &str, tags: &[String]) -> MetadataResult<()>;

    async fn get_releases(&self, owner: &str, name: &str) -> MetadataResult<Vec<String>>;

    async fn store_releases(&self, owner: &str, name: &str, releases: &[String]) -> MetadataResult<()>;

    async fn live_add_database_pg(
        &self,
        owner: &str,
        name: &str,
        blob_id: &str,
        node_name: &str,
        access: dbhub_types::Access,
    ) -> MetadataResult<()>;

    async fn update_modified(&self, owner: &str, name: &str) -> MetadataResult<()>;

    async fn log_sqlite_query_before(
        &self,
        owner: &str,
        name: &str,
        requesting_user: &str,
        sql: &str,
    ) -> MetadataResult<QueryLogId>;

    async fn log_sqlite_query_after(
        &self,
        log_id: QueryLogId,
        mem_used: i64,
        mem_highwater: i64,
    ) -> MetadataResult<()>;

    async fn get_live_db(&self, owner: &str, name: &str) -> MetadataResult<LiveDbRecord>;

    async fn list_live_dbs_on_node(&self, node_name: &str) -> MetadataResult<Vec<LiveDbRecord>>;

    async fn delete_live_db(&self, owner: &str, name: &str) -> MetadataResult<()>;
}
