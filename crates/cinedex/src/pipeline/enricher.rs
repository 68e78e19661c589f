use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{DocumentMerger, SharedStore, Stage};
use crate::backends::ContentStore;
use crate::common::{EntityType, FilmCursor};

/// 🔗 Changed person/genre ids → every film that has to be re-published because of them.
///
/// Pages through `film_works_referencing` with its own `(updated_at, id)` cursor,
/// forwarding each page of film ids to the merger. The cursor starts over at the
/// beginning of time on every batch, so each call walks the full set of dependent films;
/// the film_work checkpoint plays no part in it. It lives only for the call and is
/// never persisted.
#[derive(Debug)]
pub(crate) struct DependencyEnricher {
    entity: EntityType,
    store: SharedStore,
    page_limit: usize,
    merger: DocumentMerger,
}

impl DependencyEnricher {
    pub(crate) fn new(
        entity: EntityType,
        store: SharedStore,
        page_limit: usize,
        merger: DocumentMerger,
    ) -> Self {
        Self {
            entity,
            store,
            page_limit,
            merger,
        }
    }
}

#[async_trait]
impl Stage for DependencyEnricher {
    type Input = Vec<Uuid>;

    async fn send(&mut self, changed_ids: Vec<Uuid>) -> Result<usize> {
        let mut cursor = FilmCursor::start();
        let mut loaded = 0;
        let mut pages = 0;

        loop {
            let rows = {
                let mut store = self.store.lock().await;
                store
                    .film_works_referencing(self.entity, &changed_ids, cursor, self.page_limit)
                    .await?
            };
            let Some(next) = FilmCursor::after_page(&rows) else {
                break;
            };
            pages += 1;
            loaded += self.merger.send(rows.iter().map(|row| row.id).collect()).await?;
            cursor = next;
        }

        debug!(
            "🔗 {} changed {} ids fanned out over {} pages of films ({} documents)",
            changed_ids.len(),
            self.entity,
            pages,
            loaded
        );
        Ok(loaded)
    }
}

/// 🎭 Films go straight to the merger; people and genres take the detour through their films.
#[derive(Debug)]
pub(crate) enum Enricher {
    PassThrough(DocumentMerger),
    Dependents(DependencyEnricher),
}

#[async_trait]
impl Stage for Enricher {
    type Input = Vec<Uuid>;

    async fn send(&mut self, ids: Vec<Uuid>) -> Result<usize> {
        match self {
            Enricher::PassThrough(merger) => merger.send(ids).await,
            Enricher::Dependents(enricher) => enricher.send(ids).await,
        }
    }
}
