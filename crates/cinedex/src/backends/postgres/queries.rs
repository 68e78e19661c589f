//! 📜 The SQL. Schema and table names are spliced in (they come from config and the
//! `EntityType` enum, never from data); every value goes through a bind parameter.

use anyhow::{Result, bail};

use crate::common::EntityType;

/// 🔒 Schema names get spliced into SQL, so they must be boring identifiers.
pub(super) fn validate_schema(schema: &str) -> Result<()> {
    let boring = !schema.is_empty()
        && schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !schema.starts_with(|c: char| c.is_ascii_digit());
    if !boring {
        bail!(
            "💀 Schema name '{}' is not a plain SQL identifier. Letters, digits, underscores. That's the whole menu.",
            schema
        );
    }
    Ok(())
}

/// `$1` = lower bound (exclusive), `$2` = page size.
pub(super) fn changed_since(schema: &str, entity: EntityType) -> String {
    format!(
        "SELECT tbl.id, tbl.updated_at::timestamptz AS updated_at \
         FROM {schema}.{table} AS tbl \
         WHERE tbl.updated_at > $1 \
         ORDER BY tbl.updated_at \
         LIMIT $2",
        schema = schema,
        table = entity.table(),
    )
}

/// `$1`, `$2` = cursor `(updated_at, id)` (exclusive), `$3` = uuid[] of changed person/genre
/// ids, `$4` = page size. Each film comes back once, however many of the ids it links to.
/// `None` for `FilmWork`, which has nothing to look up.
pub(super) fn film_works_referencing(schema: &str, entity: EntityType) -> Option<String> {
    let (join_table, id_column) = entity.film_work_link()?;
    Some(format!(
        "SELECT fw.id, fw.updated_at::timestamptz AS updated_at \
         FROM {schema}.film_work AS fw \
         WHERE (fw.updated_at, fw.id) > ($1, $2) \
         AND EXISTS ( \
             SELECT 1 FROM {schema}.{join_table} AS link \
             WHERE link.film_work_id = fw.id AND link.{id_column} = ANY($3) \
         ) \
         ORDER BY fw.updated_at, fw.id \
         LIMIT $4",
    ))
}

/// `$1` = uuid[] of film ids. One row per (person role, genre) combination per film.
pub(super) fn film_work_rows(schema: &str) -> String {
    format!(
        "SELECT \
             fw.id AS film_work_id, \
             fw.title, \
             fw.description, \
             fw.rating::float8 AS rating, \
             fw.type::text AS film_type, \
             fw.created_at::timestamptz AS created_at, \
             fw.updated_at::timestamptz AS updated_at, \
             pfw.role::text AS person_role, \
             p.id AS person_id, \
             p.full_name AS person_full_name, \
             g.name AS genre_name \
         FROM {schema}.film_work AS fw \
         LEFT JOIN {schema}.person_film_work AS pfw ON pfw.film_work_id = fw.id \
         LEFT JOIN {schema}.person AS p ON p.id = pfw.person_id \
         LEFT JOIN {schema}.genre_film_work AS gfw ON gfw.film_work_id = fw.id \
         LEFT JOIN {schema}.genre AS g ON g.id = gfw.genre_id \
         WHERE fw.id = ANY($1)",
    )
}
