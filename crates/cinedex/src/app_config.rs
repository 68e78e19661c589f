//! 🔧 Configuration: one immutable [`AppConfig`], loaded once, handed to constructors.
//!
//! 🎬 Layered with figment: `CINEDEX_*` environment variables first (nested keys split on
//! `__`, so `CINEDEX_STORE__POSTGRES__PASSWORD` lands in `store.postgres.password`), then
//! the optional TOML file on top. The file wins on conflicts.
//!
//! ```toml
//! [runtime]
//! poll_interval_seconds = 30
//! page_limit = 100
//! index_name = "movies"
//!
//! [store.postgres]
//! dbname = "movies_database"
//! user = "app"
//!
//! [index.elasticsearch]
//! url = "http://127.0.0.1:9200"
//!
//! [offsets.file]
//! path = "data_storage"
//! ```

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::backends::{
    ElasticsearchIndexConfig, InMemoryIndexConfig, InMemoryStoreConfig, JsonFileOffsetsConfig,
    PostgresStoreConfig,
};
use crate::retry::RetryConfig;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    pub store: StoreConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub offsets: OffsetsConfig,
}

/// ⏱️ Scheduling and pipeline knobs.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// 😴 Sleep between two passes.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// 📄 Rows per page for both change detection and enrichment.
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    /// 📡 Target index for every document.
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default)]
    pub bulk_item_errors: BulkItemErrorPolicy,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_poll_interval_seconds() -> u64 {
    30
}

fn default_page_limit() -> usize {
    100
}

fn default_index_name() -> String {
    "movies".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval_seconds(),
            page_limit: default_page_limit(),
            index_name: default_index_name(),
            bulk_item_errors: BulkItemErrorPolicy::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// 🚦 What a 2xx bulk response with failed items means.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BulkItemErrorPolicy {
    /// Log every failed item and carry on. The checkpoint still advances.
    #[default]
    Log,
    /// Log, then fail the batch so the checkpoint stays put.
    Fail,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Postgres(PostgresStoreConfig),
    InMemory(InMemoryStoreConfig),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IndexConfig {
    Elasticsearch(ElasticsearchIndexConfig),
    InMemory(InMemoryIndexConfig),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OffsetsConfig {
    File(JsonFileOffsetsConfig),
    InMemory,
}

impl Default for OffsetsConfig {
    fn default() -> Self {
        OffsetsConfig::File(JsonFileOffsetsConfig::default())
    }
}

impl AppConfig {
    /// 🔍 Reject settings that would make the pipeline spin, stall or talk to nobody.
    pub fn validate(&self) -> Result<()> {
        let runtime = &self.runtime;
        if runtime.page_limit == 0 {
            bail!("💀 runtime.page_limit is 0. Pages of nothing, forever. Pick a positive number.");
        }
        if runtime.index_name.trim().is_empty() {
            bail!("💀 runtime.index_name is empty. The documents need somewhere to live.");
        }
        if runtime.retry.max_attempts == 0 {
            bail!("💀 runtime.retry.max_attempts is 0. Not even one try? Bold.");
        }
        if runtime.retry.backoff_coefficient == 0 {
            bail!("💀 runtime.retry.backoff_coefficient must be at least 1.");
        }
        if let IndexConfig::Elasticsearch(ref es) = self.index {
            if es.url.trim().is_empty() {
                bail!("💀 index.elasticsearch.url is empty.");
            }
        }
        if let StoreConfig::Postgres(ref pg) = self.store {
            if pg.dbname.trim().is_empty() || pg.user.trim().is_empty() {
                bail!("💀 store.postgres needs both a dbname and a user.");
            }
        }
        Ok(())
    }
}

/// 📋 Load and validate the configuration.
pub fn load_config(config_file_name: Option<&Path>) -> Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {}",
        config_file_name
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "environment only".to_string())
    );

    let config = Figment::new().merge(Env::prefixed("CINEDEX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (CINEDEX_*).",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (CINEDEX_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config.validate()?;
    Ok(app_config)
}
