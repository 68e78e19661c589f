use anyhow::Result;
use async_trait::async_trait;
use tracing::trace;

use super::{BulkLoader, Stage};
use crate::common::RelationalRow;
use crate::transforms::{IngestTransform, MovieDocuments};

/// 🔄 Rows in, documents out, straight into the loader.
#[derive(Debug)]
pub(crate) struct DocumentTransformer {
    loader: BulkLoader,
}

impl DocumentTransformer {
    pub(crate) fn new(loader: BulkLoader) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Stage for DocumentTransformer {
    type Input = Vec<RelationalRow>;

    async fn send(&mut self, rows: Vec<RelationalRow>) -> Result<usize> {
        let documents = MovieDocuments::transform_rows(&rows)?;
        trace!("🔄 {} rows folded into {} documents", rows.len(), documents.len());
        self.loader.send(documents).await
    }
}
