use std::collections::HashMap;

use anyhow::Result;
use tracing::trace;
use uuid::Uuid;

use super::IngestTransform;
use crate::common::{Document, PersonRef, RelationalRow};

/// 🎬 Folds merger rows into movie documents.
///
/// Documents come out in the order their film first appears in the rows. Within a
/// document every list keeps first-occurrence order and never holds the same value twice,
/// however many times the outer join repeated it.
pub(crate) struct MovieDocuments;

impl IngestTransform for MovieDocuments {
    fn transform_rows(rows: &[RelationalRow]) -> Result<Vec<Document>> {
        let mut documents: Vec<Document> = Vec::new();
        let mut position: HashMap<Uuid, usize> = HashMap::new();

        for row in rows {
            let slot = *position.entry(row.film_work_id).or_insert_with(|| {
                documents.push(Document::from_row(row));
                documents.len() - 1
            });
            fold_row(&mut documents[slot], row);
        }

        Ok(documents)
    }
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if !values.contains(&value) {
        values.push(value);
    }
}

fn fold_row(document: &mut Document, row: &RelationalRow) {
    if let Some(ref genre) = row.genre_name {
        push_unique(&mut document.genre, genre.clone());
    }

    let (Some(role), Some(id), Some(name)) = (
        row.person_role.as_deref(),
        row.person_id,
        row.person_full_name.as_ref(),
    ) else {
        return;
    };

    match role {
        "director" => push_unique(&mut document.director, name.clone()),
        "actor" => {
            push_unique(&mut document.actors, PersonRef { id, name: name.clone() });
            push_unique(&mut document.actors_names, name.clone());
        }
        "writer" => {
            push_unique(&mut document.writers, PersonRef { id, name: name.clone() });
            push_unique(&mut document.writers_names, name.clone());
        }
        other => trace!("🎭 Role '{}' on film {} is not part of the document", other, document.id),
    }
}
