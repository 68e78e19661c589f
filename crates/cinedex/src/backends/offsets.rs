use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::OffsetsConfig;
use crate::backends::{file, in_mem};

/// 🔖 A tiny durable key-value store for checkpoints.
///
/// # Contract 📜
/// - `get` returns the last value `set` for the key, or `None`.
/// - `set` persists the whole snapshot before returning.
/// - Broken backing state (missing file, garbage JSON) is healed locally by starting over
///   from an empty snapshot. The caller never hears about it; it just re-indexes a bit
///   more than strictly necessary, which is what at-least-once is for.
/// - Single writer. Two processes sharing one store will race and nobody will win.
#[async_trait]
pub(crate) trait OffsetStore: std::fmt::Debug + Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>>;
    async fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug)]
pub(crate) enum OffsetBackend {
    File(file::JsonFileOffsets),
    InMemory(in_mem::InMemoryOffsets),
}

impl OffsetBackend {
    pub(crate) fn from_config(config: &OffsetsConfig) -> Self {
        match config {
            OffsetsConfig::File(file_config) => {
                Self::File(file::JsonFileOffsets::new(file_config.clone()))
            }
            OffsetsConfig::InMemory => Self::InMemory(in_mem::InMemoryOffsets::default()),
        }
    }
}

#[async_trait]
impl OffsetStore for OffsetBackend {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self {
            OffsetBackend::File(store) => store.get(key).await,
            OffsetBackend::InMemory(store) => store.get(key).await,
        }
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match self {
            OffsetBackend::File(store) => store.set(key, value).await,
            OffsetBackend::InMemory(store) => store.set(key, value).await,
        }
    }
}
