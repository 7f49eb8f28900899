//! Live-node configuration (§4.3 supplementary): CLI flags mergeable with a
//! JSON config file, mirroring the teacher's `host::Cli`/`merge_from_file`.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_blob_dir() -> PathBuf {
    PathBuf::from("./blobs")
}

fn default_metadata_store_url() -> String {
    "postgres://localhost/dbhub".to_string()
}

fn default_concurrency_limit() -> usize {
    16
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_config_path() -> PathBuf {
    PathBuf::from("livenode.config.json")
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Parser)]
#[command(name = "dbhub-livenode", about = "Owns a set of live SQLite databases", long_about = None)]
#[serde(default)]
pub struct LiveNodeConfig {
    /// This node's unique name, used to claim jobs addressed to it (§4.3, §4.4).
    #[arg(long, require_equals = true)]
    pub node_name: String,

    /// Root directory under which every live DB's `<owner>/<name>/live.sqlite` lives.
    #[arg(long, require_equals = true, default_value = "./storage")]
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Local stand-in for the blob store endpoint (§1 out-of-scope collaborator).
    #[arg(long, require_equals = true, default_value = "./blobs")]
    #[serde(default = "default_blob_dir")]
    pub blob_dir: PathBuf,

    /// Connection string for the metadata store / job queue (§4.4).
    #[arg(long, require_equals = true, default_value = "postgres://localhost/dbhub")]
    #[serde(default = "default_metadata_store_url")]
    pub metadata_store_url: String,

    /// Max number of jobs this node dispatches concurrently.
    #[arg(long, require_equals = true, default_value = "16")]
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    #[arg(long, require_equals = true, env = "RUST_LOG", default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[arg(long, require_equals = true, default_value = "livenode.config.json")]
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,
}

impl LiveNodeConfig {
    /// Merges the current flags over whatever is in `config_path`, flags
    /// taking priority, the way `host::Cli::merge_from_file` does.
    pub fn merge_from_file(&mut self) -> anyhow::Result<()> {
        let path = self.config_path.clone();
        if !path.exists() {
            return Ok(());
        }
        let file = std::fs::File::open(&path)?;
        let reader = std::io::BufReader::new(file);
        let mut from_file: Value = serde_json::from_reader(reader)?;
        let current = serde_json::to_value(&self)?;
        merge_json(&mut from_file, &current);
        *self = serde_json::from_value(from_file)?;
        Ok(())
    }
}

fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                merge_json(base_map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (base_slot, overlay_val) => {
            if !overlay_val.is_null() {
                *base_slot = overlay_val.clone();
            }
        }
    }
}
