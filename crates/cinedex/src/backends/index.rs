use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::IndexConfig;
use crate::backends::{elasticsearch, in_mem};
use crate::retry::RetryPolicy;

/// 📡 A search index that speaks the `_bulk` dialect.
///
/// # Contract 📜
/// - `bulk` takes a complete NDJSON payload (action line + source line per document,
///   trailing newline included) and returns the raw response body.
/// - Any transport failure or non-2xx status is an `Err`. No retries in here: the loader
///   owns the retry loop, because it is the one that knows the whole request is safe to
///   replay (every action is an upsert by id).
/// - Per-document failures inside a 2xx response are NOT an `Err`. They live in the body,
///   and the loader decides what they mean.
#[async_trait]
pub(crate) trait SearchIndex: std::fmt::Debug + Send + Sync {
    async fn bulk(&self, payload: String) -> Result<String>;
}

/// 🎭 The many faces of a search index. Currently two. One of them is real.
#[derive(Debug)]
pub(crate) enum IndexBackend {
    Elasticsearch(elasticsearch::ElasticsearchIndex),
    InMemory(in_mem::InMemoryIndex),
}

impl IndexBackend {
    pub(crate) async fn from_config(
        config: &IndexConfig,
        index_name: &str,
        retry: RetryPolicy,
    ) -> Result<Self> {
        match config {
            IndexConfig::Elasticsearch(es) => Ok(Self::Elasticsearch(
                elasticsearch::ElasticsearchIndex::new(es.clone(), index_name, retry).await?,
            )),
            IndexConfig::InMemory(_) => Ok(Self::InMemory(in_mem::InMemoryIndex::new())),
        }
    }
}

#[async_trait]
impl SearchIndex for IndexBackend {
    async fn bulk(&self, payload: String) -> Result<String> {
        match self {
            IndexBackend::Elasticsearch(index) => index.bulk(payload).await,
            IndexBackend::InMemory(index) => index.bulk(payload).await,
        }
    }
}
