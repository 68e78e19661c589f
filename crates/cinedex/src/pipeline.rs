//! 🚰 The pipeline: five stages, each awaiting the next.
//!
//! ```text
//! ChangeDetector ─ids→ Enricher ─film ids→ DocumentMerger ─rows→ DocumentTransformer ─docs→ BulkLoader
//! ```
//!
//! 🎬 Every stage's `send` returns only after everything downstream of it has finished
//! with the batch. So when the detector gets `Ok` back for a page, that page is in the
//! index, and only then does the checkpoint move. When anything fails, the error rides
//! back up the chain, the checkpoint stays where it was, and the next pass tries again.
//!
//! One chain per entity type. All chains share one store, one index client and one offset
//! store; nobody holds the store lock across a downstream `send`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app_config::RuntimeConfig;
use crate::backends::{IndexBackend, OffsetBackend, StoreBackend};
use crate::common::EntityType;
use crate::retry::RetryPolicy;

pub(crate) mod detector;
pub(crate) mod enricher;
pub(crate) mod loader;
pub(crate) mod merger;
pub(crate) mod transformer;

pub(crate) use detector::{ChangeDetector, DetectionReport};
pub(crate) use enricher::{DependencyEnricher, Enricher};
pub(crate) use loader::BulkLoader;
pub(crate) use merger::DocumentMerger;
pub(crate) use transformer::DocumentTransformer;

pub(crate) type SharedStore = Arc<Mutex<StoreBackend>>;
pub(crate) type SharedOffsets = Arc<Mutex<OffsetBackend>>;

/// 🔗 A pipeline stage.
///
/// `send` hands one batch downstream and resolves once it's fully processed, with the
/// number of documents that made it into the index.
#[async_trait]
pub(crate) trait Stage: std::fmt::Debug + Send {
    type Input: Send;

    async fn send(&mut self, batch: Self::Input) -> Result<usize>;
}

/// 🏗️ Wire up the full chain for one entity type over the shared backends.
pub(crate) fn build_chain(
    entity: EntityType,
    store: SharedStore,
    index: Arc<IndexBackend>,
    offsets: SharedOffsets,
    runtime: &RuntimeConfig,
) -> ChangeDetector {
    let retry = RetryPolicy::from(&runtime.retry);
    let loader = BulkLoader::new(index, runtime.index_name.clone(), retry, runtime.bulk_item_errors);
    let merger = DocumentMerger::new(store.clone(), DocumentTransformer::new(loader));
    let enricher = match entity {
        EntityType::FilmWork => Enricher::PassThrough(merger),
        EntityType::Person | EntityType::Genre => Enricher::Dependents(DependencyEnricher::new(
            entity,
            store.clone(),
            runtime.page_limit,
            merger,
        )),
    };
    ChangeDetector::new(entity, store, offsets, runtime.page_limit, enricher)
}
