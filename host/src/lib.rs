// Copyright 2023 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod error;
pub mod metrics;
pub mod server;
pub mod state;

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostResult;

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_concurrency_limit() -> usize {
    16
}

fn default_max_log() -> usize {
    16
}

fn default_config_path() -> PathBuf {
    PathBuf::from("host/config/config.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_node_name() -> String {
    "any".to_string()
}

fn default_wait_timeout_secs() -> u64 {
    30
}

/// The front-end demo binary's CLI, merged with a JSON config file the same
/// way the teacher's `Cli::merge_from_file` does.
#[derive(Default, Clone, Serialize, Deserialize, Debug, Parser)]
#[command(name = "dbhub-host", about = "A front-end demo over the dispatch API", long_about = None)]
#[serde(default)]
pub struct Cli {
    #[arg(long, require_equals = true, default_value = "0.0.0.0:8080")]
    #[serde(default = "default_address")]
    /// Server bind address
    pub address: String,

    #[arg(long, require_equals = true, default_value = "16")]
    #[serde(default = "default_concurrency_limit")]
    /// Limit the max number of in-flight requests
    pub concurrency_limit: usize,

    #[arg(long, require_equals = true)]
    pub log_path: Option<PathBuf>,

    #[arg(long, require_equals = true, default_value = "7")]
    #[serde(default = "default_max_log")]
    pub max_log: usize,

    #[arg(long, require_equals = true, default_value = "host/config/config.json")]
    #[serde(default = "default_config_path")]
    /// Path to a JSON config file merged underneath the command line flags
    pub config_path: PathBuf,

    #[arg(long, require_equals = true, env = "RUST_LOG", default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// The node this front-end targets for non-`createdb` calls in this
    /// demo (a real deployment gets the owning node from the metadata
    /// store's `GetLiveDB`, see `state::DbHubState::target_node`).
    #[arg(long, require_equals = true, default_value = "any")]
    #[serde(default = "default_node_name")]
    pub default_node: String,

    /// `WaitForResponse` deadline, seconds (§9: the core never guesses a
    /// default, so the front-end is where one is finally picked).
    #[arg(long, require_equals = true, default_value = "30")]
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl Cli {
    /// Reads `config_path` and merges it underneath the current flags,
    /// flags winning (mirrors the teacher's `Cli::merge_from_file`).
    pub fn merge_from_file(&mut self) -> HostResult<()> {
        if !self.config_path.exists() {
            return Ok(());
        }
        let file = std::fs::File::open(&self.config_path)?;
        let reader = std::io::BufReader::new(file);
        let mut config: Value = serde_json::from_reader(reader)?;
        let this = serde_json::to_value(&self)?;
        merge(&mut config, &this);
        *self = serde_json::from_value(config)?;
        Ok(())
    }
}

fn merge(a: &mut Value, b: &Value) {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            for (k, v) in b {
                merge(a.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (a, b) if !b.is_null() => *a = b.clone(),
        _ => {}
    }
}
