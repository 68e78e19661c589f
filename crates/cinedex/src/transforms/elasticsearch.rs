use anyhow::{Context, Result};
use serde_json::json;

use super::EgressTransform;
use crate::common::Document;

/// 📡 Document → `{"index":{"_index":…,"_id":…}}` + newline + document JSON.
///
/// `index` (not `create`) so loading the same film twice overwrites instead of failing.
pub(crate) struct ElasticsearchBulk;

impl EgressTransform for ElasticsearchBulk {
    fn transform_document(document: &Document, index_name: &str) -> Result<String> {
        let action = json!({
            "index": {
                "_index": index_name,
                "_id": document.id.to_string(),
            }
        });
        let action_line = serde_json::to_string(&action).context(
            "💀 Failed to serialize bulk action metadata. The JSON that describes JSON has failed to become JSON.",
        )?;
        let source_line = serde_json::to_string(document).context(format!(
            "💀 Failed to serialize the document for film {}.",
            document.id
        ))?;
        Ok(format!("{}\n{}", action_line, source_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PersonRef;
    use uuid::Uuid;

    #[test]
    fn the_one_where_a_document_becomes_beautiful_bulk_format() -> Result<()> {
        let document = Document {
            id: Uuid::from_u128(42),
            title: "The Answer".to_string(),
            description: None,
            imdb_rating: Some(4.2),
            genre: vec!["Sci-Fi".to_string()],
            director: vec![],
            actors: vec![PersonRef { id: Uuid::from_u128(1), name: "Arthur Dent".to_string() }],
            actors_names: vec!["Arthur Dent".to_string()],
            writers: vec![],
            writers_names: vec![],
        };

        let bulk = ElasticsearchBulk::transform_document(&document, "movies")?;
        let lines: Vec<&str> = bulk.split('\n').collect();
        assert_eq!(lines.len(), 2, "exactly two lines. No more. No less.");

        let action: serde_json::Value = serde_json::from_str(lines[0])?;
        assert_eq!(
            action,
            json!({"index": {"_index": "movies", "_id": "00000000-0000-0000-0000-00000000002a"}})
        );

        let source: Document = serde_json::from_str(lines[1])?;
        assert_eq!(source, document);
        Ok(())
    }

    #[test]
    fn the_one_where_missing_values_are_null_not_absent() -> Result<()> {
        let document = Document {
            id: Uuid::from_u128(1),
            title: "Untitled".to_string(),
            description: None,
            imdb_rating: None,
            genre: vec![],
            director: vec![],
            actors: vec![],
            actors_names: vec![],
            writers: vec![],
            writers_names: vec![],
        };
        let bulk = ElasticsearchBulk::transform_document(&document, "movies")?;
        let source: serde_json::Value = serde_json::from_str(
            bulk.lines().nth(1).context("💀 no source line")?,
        )?;
        assert!(source["description"].is_null());
        assert!(source["imdb_rating"].is_null());
        assert_eq!(source["genre"], json!([]));
        Ok(())
    }
}
