//! 🎼 Composers: many documents in, one request body out.

use anyhow::Result;

use crate::common::Document;
use crate::transforms::{EgressTransform, ElasticsearchBulk};

pub(crate) trait Composer: std::fmt::Debug {
    fn compose(&self, documents: &[Document], index_name: &str) -> Result<String>;
}

/// 📜 `_bulk` body: one action/source pair per document, every line `\n`-terminated,
/// including the last one. Elasticsearch rejects the request without that final newline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NdjsonComposer;

impl Composer for NdjsonComposer {
    fn compose(&self, documents: &[Document], index_name: &str) -> Result<String> {
        let mut payload = String::with_capacity(documents.len() * 512);
        for document in documents {
            payload.push_str(&ElasticsearchBulk::transform_document(document, index_name)?);
            payload.push('\n');
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn document(n: u128) -> Document {
        Document {
            id: Uuid::from_u128(n),
            title: format!("Film {}", n),
            description: None,
            imdb_rating: None,
            genre: vec![],
            director: vec![],
            actors: vec![],
            actors_names: vec![],
            writers: vec![],
            writers_names: vec![],
        }
    }

    #[test]
    fn the_one_where_two_documents_make_four_lines_and_a_trailing_newline() -> Result<()> {
        let payload = NdjsonComposer.compose(&[document(1), document(2)], "movies")?;
        assert!(payload.ends_with('\n'));
        assert_eq!(payload.lines().count(), 4);

        let third: serde_json::Value =
            serde_json::from_str(payload.lines().nth(2).unwrap_or_default())?;
        assert_eq!(third["index"]["_id"], Uuid::from_u128(2).to_string());
        Ok(())
    }

    #[test]
    fn the_one_where_empty_in_means_empty_out() -> Result<()> {
        assert!(NdjsonComposer.compose(&[], "movies")?.is_empty());
        Ok(())
    }
}
