use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Enricher, SharedOffsets, SharedStore, Stage};
use crate::backends::ContentStore;
use crate::checkpoint;
use crate::common::{ChangeBatch, EntityType};

/// 📊 What one detector run got through.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DetectionReport {
    pub(crate) pages: usize,
    pub(crate) ids: usize,
    pub(crate) documents: usize,
    pub(crate) checkpoint: DateTime<Utc>,
}

/// 🔍 Head of the chain: pages through rows of one table changed after the checkpoint.
///
/// Page after page: fetch up to `page_limit` rows changed after the checkpoint, send
/// their ids downstream, and once that's `Ok`, move the checkpoint to the page's last
/// `updated_at`. An empty page ends the run and leaves the checkpoint alone.
#[derive(Debug)]
pub(crate) struct ChangeDetector {
    entity: EntityType,
    store: SharedStore,
    offsets: SharedOffsets,
    page_limit: usize,
    enricher: Enricher,
}

impl ChangeDetector {
    pub(crate) fn new(
        entity: EntityType,
        store: SharedStore,
        offsets: SharedOffsets,
        page_limit: usize,
        enricher: Enricher,
    ) -> Self {
        Self {
            entity,
            store,
            offsets,
            page_limit,
            enricher,
        }
    }

    pub(crate) fn entity(&self) -> EntityType {
        self.entity
    }

    pub(crate) async fn detect(&mut self) -> Result<DetectionReport> {
        let entity = self.entity;
        let mut report = DetectionReport {
            pages: 0,
            ids: 0,
            documents: 0,
            checkpoint: {
                let mut offsets = self.offsets.lock().await;
                checkpoint::load(&mut *offsets, entity).await?
            },
        };

        loop {
            let since = report.checkpoint;
            let rows = {
                let mut store = self.store.lock().await;
                store.changed_since(entity, since, self.page_limit).await?
            };
            let Some(batch) = ChangeBatch::from_rows(&rows) else {
                debug!("🔍 No {} changes after {}", entity, since);
                break;
            };

            let ids = batch.ids.len();
            let documents = self.enricher.send(batch.ids).await.context(format!(
                "💀 A page of {} changed {} rows could not be delivered. The checkpoint stays at {}.",
                ids, entity, since
            ))?;

            report.checkpoint = {
                let mut offsets = self.offsets.lock().await;
                checkpoint::advance(&mut *offsets, entity, batch.last_updated_at).await?
            };
            report.pages += 1;
            report.ids += ids;
            report.documents += documents;
            info!(
                "🔍 {} page {}: {} changed ids, {} documents, checkpoint → {}",
                entity, report.pages, ids, documents, report.checkpoint
            );
        }

        Ok(report)
    }
}
