//! Postgres-backed `MetadataStore` (§4.7), using `sqlx::PgPool`. Schema is
//! external to this crate (§4.7 "contract only"); statements below assume a
//! schema shaped like the teacher's task tables: one row per (owner, name)
//! carrying access, default branch, and live-node assignment, plus
//! append-only `commits`/`branches`/`tags`/`releases`/`query_log` tables.

use async_trait::async_trait;
use dbhub_types::{Access, Branch, Commit};
use sqlx::PgPool;

use crate::error::{MetadataError, MetadataResult};
use crate::store::MetadataStore;
use crate::types::{BlobLocation, LiveDbRecord, QueryLogId};

pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn access_str(access: Access) -> &'static str {
    match access {
        Access::Private => "private",
        Access::Public => "public",
    }
}

fn access_from_str(s: &str) -> Access {
    if s == "public" {
        Access::Public
    } else {
        Access::Private
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn check_db_permissions(
        &self,
        viewer: &str,
        owner: &str,
        name: &str,
        write_intent: bool,
    ) -> MetadataResult<bool> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT access, owner FROM databases WHERE owner = $1 AND name = $2",
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let (access, db_owner) = match row {
            Some(row) => row,
            None => return Ok(false),
        };

        if write_intent {
            return Ok(viewer == db_owner);
        }
        Ok(access == "public" || viewer == db_owner)
    }

    async fn minio_location(
        &self,
        owner: &str,
        name: &str,
        commit_id: Option<&str>,
        viewer: &str,
    ) -> MetadataResult<BlobLocation> {
        if !self.check_db_permissions(viewer, owner, name, false).await? {
            return Err(MetadataError::PermissionDenied);
        }

        let commit_id = match commit_id {
            Some(id) => id.to_string(),
            None => self.default_commit(owner, name).await?,
        };

        let row: Option<(chrono::DateTime<chrono::Utc>,)> = sqlx::query_as(
            "SELECT last_modified FROM commits WHERE owner = $1 AND name = $2 AND commit_id = $3",
        )
        .bind(owner)
        .bind(name)
        .bind(&commit_id)
        .fetch_optional(&self.pool)
        .await?;

        let (last_modified,) = row.ok_or_else(|| MetadataError::NotFound("commit".to_string()))?;
        let address = dbhub_types::BlobAddress::from_sha256(&commit_id)
            .ok_or_else(|| MetadataError::Validation("malformed commit id".to_string()))?;

        Ok(BlobLocation {
            bucket: address.bucket,
            object: address.object,
            last_modified,
        })
    }

    async fn default_commit(&self, owner: &str, name: &str) -> MetadataResult<String> {
        let row: (String,) = sqlx::query_as(
            "SELECT c.commit_id FROM branches b \
             JOIN commits c ON c.owner = b.owner AND c.name = b.name AND c.commit_id = b.commit_id \
             WHERE b.owner = $1 AND b.name = $2 AND b.is_default",
        )
        .bind(owner)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn get_branches(&self, owner: &str, name: &str) -> MetadataResult<Vec<Branch>> {
        let rows: Vec<(String, String, i64, Option<String>)> = sqlx::query_as(
            "SELECT name, commit_id, commit_count, description FROM branches \
             WHERE owner = $1 AND name_db = $2",
        )
        .bind(owner)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(branch_name, commit, commit_count, description)| Branch {
                name: branch_name,
                commit,
                commit_count: commit_count as u64,
                description,
            })
            .collect())
    }

    async fn get_default_branch_name(&self, owner: &str, name: &str) -> MetadataResult<String> {
        let row: (String,) = sqlx::query_as(
            "SELECT name FROM branches WHERE owner = $1 AND name_db = $2 AND is_default",
        )
        .bind(owner)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn store_branches(&self, owner: &str, name: &str, branches: &[Branch]) -> MetadataResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM branches WHERE owner = $1 AND name_db = $2")
            .bind(owner)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for branch in branches {
            sqlx::query(
                "INSERT INTO branches(owner, name_db, name, commit_id, commit_count, description) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(owner)
            .bind(name)
            .bind(&branch.name)
            .bind(&branch.commit)
            .bind(branch.commit_count as i64)
            .bind(&branch.description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_commit_list(&self, owner: &str, name: &str) -> MetadataResult<Vec<Commit>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT payload FROM commits WHERE owner = $1 AND name = $2 ORDER BY commit_date",
        )
        .bind(owner)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(payload,)| {
                serde_json::from_str(&payload)
                    .map_err(|e| MetadataError::Validation(format!("stored commit is malformed: {e}")))
            })
            .collect()
    }

    async fn store_commits(&self, owner: &str, name: &str, commits: &[Commit]) -> MetadataResult<()> {
        let mut tx = self.pool.begin().await?;
        for commit in commits {
            let payload = serde_json::to_string(commit)
                .map_err(|e| MetadataError::Validation(format!("cannot serialise commit: {e}")))?;
            sqlx::query(
                "INSERT INTO commits(owner, name, commit_id, payload, last_modified) \
                 VALUES ($1, $2, $3, $4, now()) \
                 ON CONFLICT (owner, name, commit_id) DO NOTHING",
            )
            .bind(owner)
            .bind(name)
            .bind(&commit.id)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_tags(&self, owner: &str, name: &str) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT tag FROM tags WHERE owner = $1 AND name = $2")
            .bind(owner)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    async fn store_tags(&self, owner: &str, name: &str, tags: &[String]) -> MetadataResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tags WHERE owner = $1 AND name = $2")
            .bind(owner)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for tag in tags {
            sqlx::query("INSERT INTO tags(owner, name, tag) VALUES ($1, $2, $3)")
                .bind(owner)
                .bind(name)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_releases(&self, owner: &str, name: &str) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT release FROM releases WHERE owner = $1 AND name = $2")
                .bind(owner)
                .bind(name)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(r,)| r).collect())
    }

    async fn store_releases(&self, owner: &str, name: &str, releases: &[String]) -> MetadataResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM releases WHERE owner = $1 AND name = $2")
            .bind(owner)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        for release in releases {
            sqlx::query("INSERT INTO releases(owner, name, release) VALUES ($1, $2, $3)")
                .bind(owner)
                .bind(name)
                .bind(release)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
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
        sqlx::query(
            "INSERT INTO live_databases(owner, name, blob_id, node_name, access, last_modified) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (owner, name) DO UPDATE \
             SET blob_id = excluded.blob_id, node_name = excluded.node_name, \
                 access = excluded.access, last_modified = now()",
        )
        .bind(owner)
        .bind(name)
        .bind(blob_id)
        .bind(node_name)
        .bind(access_str(access))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_modified(&self, owner: &str, name: &str) -> MetadataResult<()> {
        sqlx::query("UPDATE live_databases SET last_modified = now() WHERE owner = $1 AND name = $2")
            .bind(owner)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn log_sqlite_query_before(
        &self,
        owner: &str,
        name: &str,
        requesting_user: &str,
        sql: &str,
    ) -> MetadataResult<QueryLogId> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO query_log(owner, name, requesting_user, sql, started_at) \
             VALUES ($1, $2, $3, $4, now()) RETURNING log_id",
        )
        .bind(owner)
        .bind(name)
        .bind(requesting_user)
        .bind(sql)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn log_sqlite_query_after(
        &self,
        log_id: QueryLogId,
        mem_used: i64,
        mem_highwater: i64,
    ) -> MetadataResult<()> {
        sqlx::query(
            "UPDATE query_log SET finished_at = now(), mem_used = $2, mem_highwater = $3 \
             WHERE log_id = $1",
        )
        .bind(log_id)
        .bind(mem_used)
        .bind(mem_highwater)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_live_db(&self, owner: &str, name: &str) -> MetadataResult<LiveDbRecord> {
        let row: (String, String, String, String, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
            "SELECT owner, name, node_name, access, last_modified FROM live_databases \
             WHERE owner = $1 AND name = $2",
        )
        .bind(owner)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(LiveDbRecord {
            owner: row.0,
            name: row.1,
            node_name: row.2,
            access: access_from_str(&row.3),
            last_modified: row.4,
        })
    }

    async fn list_live_dbs_on_node(&self, node_name: &str) -> MetadataResult<Vec<LiveDbRecord>> {
        let rows: Vec<(String, String, String, String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
            "SELECT owner, name, node_name, access, last_modified FROM live_databases \
             WHERE node_name = $1",
        )
        .bind(node_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LiveDbRecord {
                owner: row.0,
                name: row.1,
                node_name: row.2,
                access: access_from_str(&row.3),
                last_modified: row.4,
            })
            .collect())
    }

    async fn delete_live_db(&self, owner: &str, name: &str) -> MetadataResult<()> {
        sqlx::query("DELETE FROM live_databases WHERE owner = $1 AND name = $2")
            .bind(owner)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
