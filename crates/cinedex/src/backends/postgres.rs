//! 🐘 The Postgres backend: the content database the movies live in.
//!
//! 🎬 Somewhere an editor fixes a typo in an actor's name. `person.updated_at` ticks
//! forward. Thirty seconds later this module notices, and four films get re-published.
//! The editor never finds out. That is the dream.
//!
//! Split three ways:
//! - `connection`: one long-lived connection, pinged before every query, rebuilt when stale
//! - `queries`: the SQL text, schema-qualified, values always bound as parameters
//! - `postgres_store`: [`ContentStore`](crate::backends::ContentStore) on top of the two

use serde::Deserialize;

mod connection;
mod postgres_store;
mod queries;

pub(crate) use postgres_store::PostgresStore;

/// 🐘 How to reach the content database.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PostgresStoreConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub dbname: String,
    pub user: String,
    /// 🔒 Optional, like flossing. Trust auth exists.
    #[serde(default)]
    pub password: Option<String>,
    /// 📂 Schema holding `film_work`, `person`, `genre` and the two join tables.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// ⏱️ Give up on a single connect attempt after this many seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "content".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}
