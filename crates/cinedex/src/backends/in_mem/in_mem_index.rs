use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::backends::SearchIndex;

#[derive(Debug, Default)]
struct IndexState {
    /// `_index` → `_id` → `_source`
    indices: BTreeMap<String, BTreeMap<String, Value>>,
    attempts: u32,
    failures_remaining: u32,
    garbage_remaining: u32,
    rejected_ids: HashSet<String>,
}

/// 🧠 A search index made of nested `BTreeMap`s.
///
/// Understands the `index` action of `_bulk` and answers the way Elasticsearch does:
/// per-item statuses, `errors: true` when any item failed. Clones share the same maps,
/// so a test can keep one handle and give the other to the pipeline.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryIndex {
    state: Arc<Mutex<IndexState>>,
}

impl InMemoryIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn documents(&self, index_name: &str) -> BTreeMap<String, Value> {
        self.state
            .lock()
            .await
            .indices
            .get(index_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Every `bulk` call so far, failed ones included.
    #[cfg(test)]
    pub(crate) async fn attempts(&self) -> u32 {
        self.state.lock().await.attempts
    }

    /// 💥 The next `count` bulk calls fail like a 503 would.
    #[cfg(test)]
    pub(crate) async fn fail_next(&self, count: u32) {
        self.state.lock().await.failures_remaining = count;
    }

    /// 🗑️ The next `count` bulk calls "succeed" with a body that is not JSON.
    #[cfg(test)]
    pub(crate) async fn respond_with_garbage_next(&self, count: u32) {
        self.state.lock().await.garbage_remaining = count;
    }

    /// 🚫 Documents with this `_id` get a per-item 400, like a mapping conflict.
    #[cfg(test)]
    pub(crate) async fn reject_id(&self, id: &str) {
        self.state.lock().await.rejected_ids.insert(id.to_string());
    }
}

fn action_target(action: &Value) -> Option<(String, String)> {
    let meta = action.get("index")?;
    let index = meta.get("_index")?.as_str()?.to_string();
    let id = meta.get("_id")?.as_str()?.to_string();
    Some((index, id))
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn bulk(&self, payload: String) -> Result<String> {
        let mut state = self.state.lock().await;
        state.attempts += 1;

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            anyhow::bail!("💀 In-memory index pretending to be a 503. It's very convincing.");
        }
        if state.garbage_remaining > 0 {
            state.garbage_remaining -= 1;
            return Ok("<html><body>502 Bad Gateway</body></html>".to_string());
        }

        let lines: Vec<&str> = payload.lines().filter(|line| !line.trim().is_empty()).collect();
        if lines.len() % 2 != 0 {
            anyhow::bail!(
                "💀 Bulk payload has {} non-empty lines. Action and source come in pairs.",
                lines.len()
            );
        }

        let mut items = Vec::with_capacity(lines.len() / 2);
        let mut errors = false;
        for pair in lines.chunks(2) {
            let action: Value = serde_json::from_str(pair[0])
                .context("💀 Bulk action line is not JSON. Elasticsearch would 400 this.")?;
            let source: Value = serde_json::from_str(pair[1])
                .context("💀 Bulk source line is not JSON. Elasticsearch would 400 this.")?;
            let (index, id) = action_target(&action)
                .context("💀 Bulk action line is not an `index` action with `_index` and `_id`.")?;

            if state.rejected_ids.contains(&id) {
                errors = true;
                items.push(json!({"index": {
                    "_index": index,
                    "_id": id,
                    "status": 400,
                    "error": {
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse (rejected on purpose)"
                    }
                }}));
                continue;
            }

            let previous = state
                .indices
                .entry(index.clone())
                .or_default()
                .insert(id.clone(), source);
            let (status, result) = match previous {
                Some(_) => (200, "updated"),
                None => (201, "created"),
            };
            items.push(json!({"index": {
                "_index": index,
                "_id": id,
                "status": status,
                "result": result
            }}));
        }

        Ok(json!({"took": 1, "errors": errors, "items": items}).to_string())
    }
}
