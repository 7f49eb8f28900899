//! Axum routes over the dispatch API: one thin handler per operation,
//! resolving the owning node then delegating straight to `Dispatcher`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use dbhub_types::Access;
use serde::{Deserialize, Serialize};

use crate::error::HostResult;
use crate::state::DbHubState;

#[derive(Deserialize)]
pub struct SqlBody {
    pub sql: String,
    #[serde(default = "default_user")]
    pub user: String,
}

fn default_user() -> String {
    "anonymous".to_string()
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub results: serde_json::Value,
}

pub async fn query(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Json(body): Json<SqlBody>,
) -> HostResult<Json<QueryResponse>> {
    let node = state.target_node(&owner, &name).await?;
    let results = state
        .dispatcher
        .query(&node, &owner, &name, &body.user, &body.sql, state.wait_timeout)
        .await?;
    Ok(Json(QueryResponse { results }))
}

#[derive(Serialize)]
pub struct ExecuteResponse {
    pub rows_changed: u64,
}

pub async fn execute(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Json(body): Json<SqlBody>,
) -> HostResult<Json<ExecuteResponse>> {
    let node = state.target_node(&owner, &name).await?;
    let rows_changed = state
        .dispatcher
        .execute(&node, &owner, &name, &body.user, &body.sql, state.wait_timeout)
        .await?;
    Ok(Json(ExecuteResponse { rows_changed }))
}

#[derive(Deserialize)]
pub struct UserQuery {
    #[serde(default = "default_user")]
    pub user: String,
}

pub async fn tables(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Query(q): Query<UserQuery>,
) -> HostResult<Json<Vec<String>>> {
    let node = state.target_node(&owner, &name).await?;
    let tables = state
        .dispatcher
        .tables(&node, &owner, &name, &q.user, state.wait_timeout)
        .await?;
    Ok(Json(tables))
}

pub async fn views(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Query(q): Query<UserQuery>,
) -> HostResult<Json<Vec<String>>> {
    let node = state.target_node(&owner, &name).await?;
    let views = state
        .dispatcher
        .views(&node, &owner, &name, &q.user, state.wait_timeout)
        .await?;
    Ok(Json(views))
}

pub async fn columns(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name, table)): Path<(String, String, String)>,
    Query(q): Query<UserQuery>,
) -> HostResult<Json<Vec<String>>> {
    let node = state.target_node(&owner, &name).await?;
    let columns = state
        .dispatcher
        .columns(&node, &owner, &name, &q.user, &table, state.wait_timeout)
        .await?;
    Ok(Json(columns))
}

#[derive(Deserialize)]
pub struct IndexesQuery {
    #[serde(default = "default_user")]
    pub user: String,
    pub table: Option<String>,
}

pub async fn indexes(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Query(q): Query<IndexesQuery>,
) -> HostResult<Json<Vec<dbhub_types::job::IndexInfo>>> {
    let node = state.target_node(&owner, &name).await?;
    let indexes = state
        .dispatcher
        .indexes(&node, &owner, &name, &q.user, q.table.as_deref(), state.wait_timeout)
        .await?;
    Ok(Json(indexes))
}

#[derive(Serialize)]
pub struct SizeResponse {
    pub size: u64,
}

pub async fn size(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Query(q): Query<UserQuery>,
) -> HostResult<Json<SizeResponse>> {
    let node = state.target_node(&owner, &name).await?;
    let size = state
        .dispatcher
        .size(&node, &owner, &name, &q.user, state.wait_timeout)
        .await?;
    Ok(Json(SizeResponse { size }))
}

#[derive(Deserialize)]
pub struct CreateDbBody {
    pub blob_id: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default = "default_user")]
    pub user: String,
}

#[derive(Serialize)]
pub struct CreateDbResponse {
    pub node_name: String,
}

pub async fn create_db(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Json(body): Json<CreateDbBody>,
) -> HostResult<Json<CreateDbResponse>> {
    let node_name = state
        .dispatcher
        .create_db(&owner, &name, &body.user, &body.blob_id, body.access, state.wait_timeout)
        .await?;
    Ok(Json(CreateDbResponse { node_name }))
}

pub async fn delete(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Query(q): Query<UserQuery>,
) -> HostResult<Json<serde_json::Value>> {
    let node = state.target_node(&owner, &name).await?;
    state
        .dispatcher
        .delete(&node, &owner, &name, &q.user, state.wait_timeout)
        .await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn backup(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name)): Path<(String, String)>,
    Query(q): Query<UserQuery>,
) -> HostResult<Json<serde_json::Value>> {
    let node = state.target_node(&owner, &name).await?;
    state
        .dispatcher
        .backup(&node, &owner, &name, &q.user, state.wait_timeout)
        .await?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Deserialize)]
pub struct RowDataQuery {
    #[serde(default = "default_user")]
    pub user: String,
    pub sort_col: Option<String>,
    pub sort_dir: Option<dbhub_types::job::SortDir>,
    pub commit_id: Option<String>,
    #[serde(default)]
    pub row_offset: u32,
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,
}

fn default_max_rows() -> u32 {
    100
}

#[derive(Serialize)]
pub struct RowDataResponse {
    pub row_data: serde_json::Value,
    pub database_size: u64,
    pub default_table: String,
    pub tables: Vec<String>,
}

pub async fn row_data(
    State(state): State<Arc<DbHubState>>,
    Path((owner, name, table)): Path<(String, String, String)>,
    Query(q): Query<RowDataQuery>,
) -> HostResult<Json<RowDataResponse>> {
    let node = state.target_node(&owner, &name).await?;
    let (row_data, database_size, default_table, tables) = state
        .dispatcher
        .row_data(
            &node,
            &owner,
            &name,
            &q.user,
            &table,
            q.sort_col.as_deref(),
            q.sort_dir,
            q.commit_id.as_deref(),
            q.row_offset,
            q.max_rows,
            state.wait_timeout,
        )
        .await?;
    Ok(Json(RowDataResponse {
        row_data,
        database_size,
        default_table,
        tables,
    }))
}
