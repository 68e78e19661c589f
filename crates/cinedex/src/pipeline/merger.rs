use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{DocumentTransformer, SharedStore, Stage};
use crate::backends::ContentStore;

/// 🧱 Film ids → every row of the outer join for those films.
#[derive(Debug)]
pub(crate) struct DocumentMerger {
    store: SharedStore,
    transformer: DocumentTransformer,
}

impl DocumentMerger {
    pub(crate) fn new(store: SharedStore, transformer: DocumentTransformer) -> Self {
        Self { store, transformer }
    }
}

#[async_trait]
impl Stage for DocumentMerger {
    type Input = Vec<Uuid>;

    async fn send(&mut self, film_work_ids: Vec<Uuid>) -> Result<usize> {
        // the enricher may hand over the same film more than once
        let mut seen = HashSet::with_capacity(film_work_ids.len());
        let unique: Vec<Uuid> = film_work_ids.into_iter().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return Ok(0);
        }

        let rows = {
            let mut store = self.store.lock().await;
            store.film_work_rows(&unique).await?
        };
        debug!("🧱 {} films merged into {} rows", unique.len(), rows.len());
        self.transformer.send(rows).await
    }
}
