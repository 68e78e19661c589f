//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! 🎬 COLD OPEN: INT. SEARCH BOX: SOME TUESDAY
//!
//! A user types "the godf" and expects a movie. Behind the curtain, this module is the
//! reason that movie has the right director, the right genres, and the actor whose name
//! an editor fixed thirty seconds ago.
//!
//! It speaks exactly one endpoint: `POST /_bulk`. It pings the cluster once at startup,
//! peeks at the target index, and then does nothing but ship NDJSON until the end of time.
//! Retrying is not its job; the loader owns that.
//!
//! 🦆 (the duck has been indexed. `_id: duck`. `result: updated`.)

use serde::Deserialize;

mod elasticsearch_index;

pub(crate) use elasticsearch_index::ElasticsearchIndex;

/// 📡 Where the cluster lives and how to prove we're allowed in.
///
/// `api_key` wins over `username`/`password` when both are set.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ElasticsearchIndexConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// ⏱️ Whole-request timeout for a single `_bulk` call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}
