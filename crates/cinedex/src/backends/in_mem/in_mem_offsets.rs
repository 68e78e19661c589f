use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::backends::OffsetStore;

/// 🧠 Checkpoints that live exactly as long as the process. Handy for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryOffsets {
    values: HashMap<String, String>,
}

#[async_trait]
impl OffsetStore for InMemoryOffsets {
    async fn get(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
