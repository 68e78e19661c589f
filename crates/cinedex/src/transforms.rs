//! 🔄 Transforms: pure functions between the database and the wire.
//!
//! 🎬 Ingest: a pile of flat [`RelationalRow`]s (one per person × genre combination,
//! because that's what outer joins do) gets folded into one [`Document`] per film.
//! Egress: a [`Document`] becomes the two NDJSON lines `_bulk` wants.
//!
//! No I/O, no async. Everything in here can be tested with a `Vec` and a strong coffee.

use anyhow::Result;

use crate::common::{Document, RelationalRow};

pub(crate) mod elasticsearch;
pub(crate) mod movies;

pub(crate) use elasticsearch::ElasticsearchBulk;
pub(crate) use movies::MovieDocuments;

/// 📥 Relational rows → documents.
pub(crate) trait IngestTransform {
    fn transform_rows(rows: &[RelationalRow]) -> Result<Vec<Document>>;
}

/// 📤 One document → its wire representation, without the trailing newline.
pub(crate) trait EgressTransform {
    fn transform_document(document: &Document, index_name: &str) -> Result<String>;
}
