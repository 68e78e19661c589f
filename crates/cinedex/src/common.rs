//! 📦 Common data structures: the things that travel down the pipeline.
//!
//! 🎬 A film changes. Its id rides a [`ChangeBatch`] out of the detector, becomes a
//! handful of [`RelationalRow`]s in the merger, gets folded into one [`Document`] by the
//! transformer, and finally leaves the building as two lines of NDJSON. Nobody claps.
//! The index just quietly gets a little more correct. 🦆
//!
//! Everything here is plain data: no I/O, no async, no opinions about retries.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 🎭 The three tables we watch for changes.
///
/// `FilmWork` is the main character. `Person` and `Genre` are supporting cast: when they
/// change, every film they appear in has to be re-published, because the film document
/// carries their names baked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    FilmWork,
    Person,
    Genre,
}

impl EntityType {
    /// 🔄 The order a scheduling pass walks the entities in.
    pub const ALL: [EntityType; 3] = [EntityType::FilmWork, EntityType::Person, EntityType::Genre];

    /// 📋 Table name in the content schema.
    pub fn table(&self) -> &'static str {
        match self {
            EntityType::FilmWork => "film_work",
            EntityType::Person => "person",
            EntityType::Genre => "genre",
        }
    }

    /// 🔗 `(join table, id column)` linking this entity to `film_work`.
    /// `None` for `FilmWork` itself: a film does not depend on a film.
    pub fn film_work_link(&self) -> Option<(&'static str, &'static str)> {
        match self {
            EntityType::FilmWork => None,
            EntityType::Person => Some(("person_film_work", "person_id")),
            EntityType::Genre => Some(("genre_film_work", "genre_id")),
        }
    }

    /// 🔑 Offset store key holding this entity's checkpoint, e.g. `person_updated_at`.
    pub fn checkpoint_key(&self) -> String {
        format!("{}_updated_at", self.table())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// ⏳ The dawn of time, as far as this crate is concerned: `0001-01-01T00:00:00Z`.
///
/// Used as the lower bound when no checkpoint exists and as the starting watermark of
/// every enrichment. Postgres happily stores year 1; chrono's own `MIN_UTC` sits a few
/// hundred thousand years earlier and Postgres would rather not talk about it.
pub fn beginning_of_time() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// 🆔 One changed row: who changed, and when.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ChangedRow {
    pub id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// 📦 A page of changed ids plus the `updated_at` of its last row.
///
/// The detector hands `ids` downstream and, only once that returns `Ok`, moves the
/// checkpoint to `last_updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeBatch {
    pub ids: Vec<Uuid>,
    pub last_updated_at: DateTime<Utc>,
}

impl ChangeBatch {
    /// 🏗️ Builds a batch from a page of rows. An empty page is `None`: that's the
    /// "no more changes" signal every paging loop stops on.
    pub fn from_rows(rows: &[ChangedRow]) -> Option<Self> {
        let last = rows.last()?;
        Some(Self {
            ids: rows.iter().map(|row| row.id).collect(),
            last_updated_at: last.updated_at,
        })
    }
}

/// 🧭 Where the enricher is in its `(updated_at, id)` walk over dependent films.
///
/// Bulk-loaded catalogues are full of films sharing one `updated_at`. The id breaks the
/// tie, so a page that ends halfway through such a run picks up at the next id instead
/// of leaping over the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FilmCursor {
    pub updated_at: DateTime<Utc>,
    pub id: Uuid,
}

impl FilmCursor {
    /// Before every film there is.
    pub fn start() -> Self {
        Self {
            updated_at: beginning_of_time(),
            id: Uuid::nil(),
        }
    }

    pub fn of(row: &ChangedRow) -> Self {
        Self {
            updated_at: row.updated_at,
            id: row.id,
        }
    }

    /// The last row of a page, or `None` when the page is empty and the walk is over.
    pub fn after_page(rows: &[ChangedRow]) -> Option<Self> {
        rows.last().map(Self::of)
    }
}

/// 🧱 One flat row out of the merger's outer join.
///
/// A film with N people and M genres produces up to N×M of these. Everything on the
/// person/genre side is optional: a film with no cast still gets exactly one row, with
/// all the join fields `None`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RelationalRow {
    pub film_work_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub film_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub person_role: Option<String>,
    pub person_id: Option<Uuid>,
    pub person_full_name: Option<String>,
    pub genre_name: Option<String>,
}

/// 🎬 `{id, name}`: how actors and writers show up inside a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: Uuid,
    pub name: String,
}

/// 📄 The index-ready movie document. One per film, keyed by `id`.
///
/// The `Vec` fields behave like insertion-ordered sets: the transformer never pushes a
/// value that is already there, so the first occurrence wins and the order is
/// deterministic for a given row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub imdb_rating: Option<f64>,
    pub genre: Vec<String>,
    pub director: Vec<String>,
    pub actors: Vec<PersonRef>,
    pub actors_names: Vec<String>,
    pub writers: Vec<PersonRef>,
    pub writers_names: Vec<String>,
}

impl Document {
    /// 🏗️ A fresh document with the film's scalar fields and empty relations.
    pub fn from_row(row: &RelationalRow) -> Self {
        Self {
            id: row.film_work_id,
            title: row.title.clone(),
            description: row.description.clone(),
            imdb_rating: row.rating,
            genre: Vec::new(),
            director: Vec::new(),
            actors: Vec::new(),
            actors_names: Vec::new(),
            writers: Vec::new(),
            writers_names: Vec::new(),
        }
    }
}
