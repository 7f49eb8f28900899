//! Dispatch handlers (§4.3): routes one claimed [`JobDetails`] to the
//! sandboxed session (C1) and diff engine (C2), producing a typed
//! [`ResponseDetails`].

use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use dbhub_metadata::MetadataStore;
use dbhub_sqlite_session::query::{
    read_sqlite_db_cols, sqlite_run_query, tables as list_tables, tables_and_views, views as list_views,
    ReadColsOptions, RenderSource, SortDir as SessionSortDir,
};
use dbhub_sqlite_session::Session;
use dbhub_types::job::{IndexColumn, IndexInfo, JobDetails, JobOperation, ResponseDetails, ResponsePayload, RowDataParams};
use tracing::{info, instrument, warn};

use crate::blobstore::{sha256_hex_of_file, BlobStore};
use crate::config::LiveNodeConfig;
use crate::error::{LiveNodeError, LiveNodeResult};
use crate::storage::{delete_live_db_files, live_db_path};

fn sort_dir(dir: dbhub_types::job::SortDir) -> SessionSortDir {
    match dir {
        dbhub_types::job::SortDir::Asc => SessionSortDir::Asc,
        dbhub_types::job::SortDir::Desc => SessionSortDir::Desc,
    }
}

/// Runs one dispatched operation against the node's local storage. Every
/// path returns `Ok(ResponseDetails)`; a handler-level error is turned into
/// an error-carrying `ResponseDetails` by the caller (§4.3 "every handler
/// returns a typed response struct whose Err field is populated").
#[instrument(skip(config, blob_store, metadata, details), fields(op = %details.operation, owner = %details.dbowner, db = %details.dbname))]
pub async fn dispatch(
    config: &LiveNodeConfig,
    blob_store: &dyn BlobStore,
    metadata: &dyn MetadataStore,
    details: JobDetails,
) -> LiveNodeResult<ResponseDetails> {
    let db_path = live_db_path(&config.storage_dir, &details.dbowner, &details.dbname);

    match details.operation {
        JobOperation::Createdb => create_db(config, blob_store, &details, &db_path).await,
        JobOperation::Delete => delete_db(config, &details, &db_path),
        JobOperation::Query => query(metadata, &details, &db_path).await,
        JobOperation::Execute => execute(&details, &db_path),
        JobOperation::Tables => tables_op(&db_path),
        JobOperation::Views => views_op(&db_path),
        JobOperation::Columns => columns_op(&details, &db_path),
        JobOperation::Indexes => indexes_op(&details, &db_path),
        JobOperation::Size => size_op(&db_path),
        JobOperation::Backup => backup(blob_store, &db_path).await,
        JobOperation::RowData => row_data(&details, &db_path),
    }
}

fn data_as_str<'a>(details: &'a JobDetails) -> LiveNodeResult<&'a str> {
    details
        .data
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or_else(|| LiveNodeError::Validation("missing job data payload".to_string()))
}

async fn create_db(
    config: &LiveNodeConfig,
    blob_store: &dyn BlobStore,
    details: &JobDetails,
    db_path: &Path,
) -> LiveNodeResult<ResponseDetails> {
    let blob_id = data_as_str(details)?;
    let bytes = blob_store.get(blob_id).await?;
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(db_path, bytes).await?;

    let session = Session::open_live(db_path)?;
    if !session.integrity_check()? {
        return Err(LiveNodeError::IntegrityFailure {
            owner: details.dbowner.clone(),
            name: details.dbname.clone(),
        });
    }

    info!(node = %config.node_name, "created live database");
    Ok(ResponseDetails::ok(ResponsePayload::CreateDb {
        node_name: config.node_name.clone(),
    }))
}

fn delete_db(config: &LiveNodeConfig, details: &JobDetails, _db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    delete_live_db_files(&config.storage_dir, &details.dbowner, &details.dbname)?;
    Ok(ResponseDetails::ok(ResponsePayload::Empty {}))
}

/// Runs a `query` op bracketed by a usage-log entry (§4.7's
/// `LogSQLiteQueryBefore`/`LogSQLiteQueryAfter`), recording the real memory
/// stats `SQLiteRunQuery` returns rather than discarding them.
async fn query(metadata: &dyn MetadataStore, details: &JobDetails, db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let sql = data_as_str(details)?;
    let log_id = metadata
        .log_sqlite_query_before(&details.dbowner, &details.dbname, &details.requesting_user, sql)
        .await?;

    let session = Session::open_live(db_path)?;
    let (stats, columns, rows) = sqlite_run_query(&session, sql, RenderSource::Api, false, false)?;

    metadata
        .log_sqlite_query_after(log_id, stats.memory_used, stats.memory_highwater)
        .await?;

    let results = serde_json::json!({ "columns": columns, "rows": rows.iter().map(|r| format!("{r:?}")).collect::<Vec<_>>() });
    Ok(ResponseDetails::ok(ResponsePayload::Query { results }))
}

fn execute(details: &JobDetails, db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let sql = data_as_str(details)?;
    let session = Session::open_live(db_path)?;
    let rows_changed = session.connection().execute_batch(sql).map(|_| session.connection().changes())?;
    Ok(ResponseDetails::ok(ResponsePayload::Execute { rows_changed }))
}

fn tables_op(db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let session = Session::open_live(db_path)?;
    let tables = list_tables(&session)?;
    Ok(ResponseDetails::ok(ResponsePayload::Tables { tables }))
}

fn views_op(db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let session = Session::open_live(db_path)?;
    let tables = list_views(&session)?;
    Ok(ResponseDetails::ok(ResponsePayload::Tables { tables }))
}

fn columns_op(details: &JobDetails, db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let table = data_as_str(details)?;
    let session = Session::open_live(db_path)?;
    let (pk, other) = dbhub_sqlite_session::primary_key_and_other_columns(&session, "main", table, false)?;
    let mut tables = pk.columns();
    tables.extend(other);
    Ok(ResponseDetails::ok(ResponsePayload::Tables { tables }))
}

fn indexes_op(details: &JobDetails, db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let table_filter = details.data.as_ref().and_then(|v| v.as_str());
    let session = Session::open_live(db_path)?;
    let candidate_tables = match table_filter {
        Some(t) => vec![t.to_string()],
        None => list_tables(&session)?,
    };

    let mut indexes = Vec::new();
    for table in candidate_tables {
        let conn = session.connection();
        let sql = format!("PRAGMA index_list({})", dbhub_sqlite_session::quote_identifier(&table));
        let mut stmt = conn.prepare(&sql)?;
        let index_names: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>("name"))?
            .collect::<Result<_, _>>()?;
        for index_name in index_names {
            let info_sql = format!("PRAGMA index_info({})", dbhub_sqlite_session::quote_identifier(&index_name));
            let mut info_stmt = conn.prepare(&info_sql)?;
            let columns: Vec<IndexColumn> = info_stmt
                .query_map([], |row| {
                    Ok(IndexColumn {
                        id: row.get::<_, i64>("seqno")? as u32,
                        name: row.get("name")?,
                    })
                })?
                .collect::<Result<_, _>>()?;
            indexes.push(IndexInfo {
                name: index_name,
                table: table.clone(),
                columns,
            });
        }
    }
    Ok(ResponseDetails::ok(ResponsePayload::Indexes { indexes }))
}

fn size_op(db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let size = std::fs::metadata(db_path)?.len();
    Ok(ResponseDetails::ok(ResponsePayload::Size { size }))
}

/// `backup` (§4.3): `VACUUM INTO <tmp>`, integrity-check the vacuumed copy,
/// upload it to the blob store keyed by its own content hash.
async fn backup(blob_store: &dyn BlobStore, db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let tmp_path = db_path.with_extension("vacuum-tmp");
    {
        let session = Session::open_live(db_path)?;
        let sql = format!(
            "VACUUM INTO {}",
            dbhub_sqlite_session::quote_value(&dbhub_sqlite_session::SqlValue::Text(
                tmp_path.to_string_lossy().to_string()
            ))
        );
        session.connection().execute_batch(&sql)?;
    }

    let vacuumed = Session::open_defensive(&tmp_path)?;
    let ok = vacuumed.integrity_check()?;
    drop(vacuumed);
    if !ok {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(LiveNodeError::IntegrityFailure {
            owner: String::new(),
            name: String::new(),
        });
    }

    let sha256 = sha256_hex_of_file(&tmp_path)?;
    let bytes = tokio::fs::read(&tmp_path).await?;
    blob_store.put(&sha256, bytes).await?;
    let _ = std::fs::remove_file(&tmp_path);

    warn!(%sha256, "live database backed up");
    Ok(ResponseDetails::ok(ResponsePayload::Empty {}))
}

/// `rowdata` (§4.3, §4.6): decodes the double-encoded `RowDataParams`
/// (base64 then JSON) and returns a page of rows alongside sibling metadata
/// the front-end needs for its table picker.
fn row_data(details: &JobDetails, db_path: &Path) -> LiveNodeResult<ResponseDetails> {
    let encoded = data_as_str(details)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| LiveNodeError::Validation(e.to_string()))?;
    let params: RowDataParams = serde_json::from_slice(&decoded)?;

    let session = Session::open_live(db_path)?;
    let all_tables = tables_and_views(&session)?;
    if !all_tables.iter().any(|t| t == &params.db_table) {
        return Err(LiveNodeError::TableNotPresent(params.db_table));
    }

    let page = read_sqlite_db_cols(
        &session,
        &params.db_table,
        ReadColsOptions {
            sort_col: params.sort_col.as_deref(),
            sort_dir: params.sort_dir.map(sort_dir).unwrap_or(SessionSortDir::Asc),
            limit: Some(params.max_rows),
            offset: Some(params.row_offset),
        },
    )?;

    let row_data = serde_json::json!({
        "columns": page.column_names,
        "rows": page.rows.iter().map(|r| format!("{r:?}")).collect::<Vec<_>>(),
        "total_rows": page.total_rows,
    });
    let database_size = std::fs::metadata(db_path)?.len();
    let default_table = all_tables.first().cloned().unwrap_or_default();

    Ok(ResponseDetails::ok(ResponsePayload::RowData {
        row_data,
        database_size,
        default_table,
        tables: all_tables,
    }))
}
