use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::InMemoryStoreConfig;
use crate::backends::ContentStore;
use crate::common::{ChangedRow, EntityType, FilmCursor, RelationalRow};

/// 🎬 A row of `film_work`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub(crate) struct FilmWorkRecord {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) rating: Option<f64>,
    #[serde(default, rename = "type")]
    pub(crate) film_type: Option<String>,
    #[serde(default)]
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// 🧑 A row of `person`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub(crate) struct PersonRecord {
    pub(crate) id: Uuid,
    pub(crate) full_name: String,
    pub(crate) updated_at: DateTime<Utc>,
}

/// 🏷️ A row of `genre`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub(crate) struct GenreRecord {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) updated_at: DateTime<Utc>,
}

/// 🔗 A row of `person_film_work`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub(crate) struct PersonFilmWorkRecord {
    pub(crate) film_work_id: Uuid,
    pub(crate) person_id: Uuid,
    pub(crate) role: String,
}

/// 🔗 A row of `genre_film_work`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub(crate) struct GenreFilmWorkRecord {
    pub(crate) film_work_id: Uuid,
    pub(crate) genre_id: Uuid,
}

/// 🗄️ The five content tables, field-for-field. Also the JSON fixture format.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct ContentTables {
    #[serde(default)]
    pub(crate) film_work: Vec<FilmWorkRecord>,
    #[serde(default)]
    pub(crate) person: Vec<PersonRecord>,
    #[serde(default)]
    pub(crate) genre: Vec<GenreRecord>,
    #[serde(default)]
    pub(crate) person_film_work: Vec<PersonFilmWorkRecord>,
    #[serde(default)]
    pub(crate) genre_film_work: Vec<GenreFilmWorkRecord>,
}

impl ContentTables {
    fn changed_since(&self, entity: EntityType, since: DateTime<Utc>, limit: usize) -> Vec<ChangedRow> {
        let mut rows: Vec<ChangedRow> = match entity {
            EntityType::FilmWork => self
                .film_work
                .iter()
                .map(|row| ChangedRow { id: row.id, updated_at: row.updated_at })
                .collect(),
            EntityType::Person => self
                .person
                .iter()
                .map(|row| ChangedRow { id: row.id, updated_at: row.updated_at })
                .collect(),
            EntityType::Genre => self
                .genre
                .iter()
                .map(|row| ChangedRow { id: row.id, updated_at: row.updated_at })
                .collect(),
        };
        rows.retain(|row| row.updated_at > since);
        // stable sort: equal timestamps keep table order, like a heap scan would
        rows.sort_by_key(|row| row.updated_at);
        rows.truncate(limit);
        rows
    }

    fn film_works_referencing(
        &self,
        entity: EntityType,
        ids: &[Uuid],
        after: FilmCursor,
        limit: usize,
    ) -> Vec<ChangedRow> {
        let linked: HashSet<Uuid> = match entity {
            EntityType::FilmWork => return Vec::new(),
            EntityType::Person => self
                .person_film_work
                .iter()
                .filter(|link| ids.contains(&link.person_id))
                .map(|link| link.film_work_id)
                .collect(),
            EntityType::Genre => self
                .genre_film_work
                .iter()
                .filter(|link| ids.contains(&link.genre_id))
                .map(|link| link.film_work_id)
                .collect(),
        };

        // one row per film, like the EXISTS in the real query
        let mut rows: Vec<ChangedRow> = self
            .film_work
            .iter()
            .filter(|film| linked.contains(&film.id))
            .map(|film| ChangedRow { id: film.id, updated_at: film.updated_at })
            .filter(|row| FilmCursor::of(row) > after)
            .collect();
        rows.sort_by_key(FilmCursor::of);
        rows.truncate(limit);
        rows
    }

    fn film_work_rows(&self, film_work_ids: &[Uuid]) -> Vec<RelationalRow> {
        let mut rows = Vec::new();
        for film in self.film_work.iter().filter(|film| film_work_ids.contains(&film.id)) {
            let mut people: Vec<(Option<String>, Option<Uuid>, Option<String>)> = self
                .person_film_work
                .iter()
                .filter(|link| link.film_work_id == film.id)
                .map(|link| {
                    let person = self.person.iter().find(|person| person.id == link.person_id);
                    (
                        Some(link.role.clone()),
                        person.map(|person| person.id),
                        person.map(|person| person.full_name.clone()),
                    )
                })
                .collect();
            if people.is_empty() {
                people.push((None, None, None));
            }

            let mut genres: Vec<Option<String>> = self
                .genre_film_work
                .iter()
                .filter(|link| link.film_work_id == film.id)
                .map(|link| {
                    self.genre
                        .iter()
                        .find(|genre| genre.id == link.genre_id)
                        .map(|genre| genre.name.clone())
                })
                .collect();
            if genres.is_empty() {
                genres.push(None);
            }

            for (role, person_id, full_name) in &people {
                for genre_name in &genres {
                    rows.push(RelationalRow {
                        film_work_id: film.id,
                        title: film.title.clone(),
                        description: film.description.clone(),
                        rating: film.rating,
                        film_type: film.film_type.clone(),
                        created_at: film.created_at,
                        updated_at: Some(film.updated_at),
                        person_role: role.clone(),
                        person_id: *person_id,
                        person_full_name: full_name.clone(),
                        genre_name: genre_name.clone(),
                    });
                }
            }
        }
        rows
    }
}

/// 📝 What the store was asked, in order. Lets tests check lower bounds and watermarks.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoreCall {
    ChangedSince { entity: EntityType, since: DateTime<Utc> },
    FilmWorksReferencing { entity: EntityType, ids: Vec<Uuid>, after: FilmCursor },
    FilmWorkRows { ids: Vec<Uuid> },
}

#[derive(Debug, Default)]
struct StoreState {
    tables: ContentTables,
    calls: Vec<StoreCall>,
    failures_remaining: u32,
}

impl StoreState {
    fn take_failure(&mut self) -> Result<()> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            anyhow::bail!("💀 In-memory store was told to fail, and it is nothing if not obedient.");
        }
        Ok(())
    }
}

/// 🧠 [`ContentStore`] over in-memory tables. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub(crate) fn new(tables: ContentTables) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                tables,
                ..StoreState::default()
            })),
        }
    }

    pub(crate) async fn from_config(config: &InMemoryStoreConfig) -> Result<Self> {
        match config.fixture {
            Some(ref path) => Ok(Self::new(load_fixture(path).await?)),
            None => Ok(Self::default()),
        }
    }

    /// ✏️ Mutate the tables in place, the way an editor would through the admin panel.
    #[cfg(test)]
    pub(crate) async fn edit<R>(&self, edit: impl FnOnce(&mut ContentTables) -> R) -> R {
        edit(&mut self.state.lock().await.tables)
    }

    #[cfg(test)]
    pub(crate) async fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().await.calls.clone()
    }

    /// 💥 The next `count` queries fail, whatever they are.
    #[cfg(test)]
    pub(crate) async fn fail_next(&self, count: u32) {
        self.state.lock().await.failures_remaining = count;
    }
}

async fn load_fixture(path: &Path) -> Result<ContentTables> {
    let raw = tokio::fs::read_to_string(path).await.context(format!(
        "💀 Could not read the content fixture at '{}'.",
        path.display()
    ))?;
    serde_json::from_str(&raw).context(format!(
        "💀 The content fixture at '{}' is not the JSON we were promised.",
        path.display()
    ))
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn changed_since(
        &mut self,
        entity: EntityType,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangedRow>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::ChangedSince { entity, since });
        state.take_failure()?;
        Ok(state.tables.changed_since(entity, since, limit))
    }

    async fn film_works_referencing(
        &mut self,
        entity: EntityType,
        ids: &[Uuid],
        after: FilmCursor,
        limit: usize,
    ) -> Result<Vec<ChangedRow>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::FilmWorksReferencing {
            entity,
            ids: ids.to_vec(),
            after,
        });
        state.take_failure()?;
        Ok(state.tables.film_works_referencing(entity, ids, after, limit))
    }

    async fn film_work_rows(&mut self, film_work_ids: &[Uuid]) -> Result<Vec<RelationalRow>> {
        let mut state = self.state.lock().await;
        state.calls.push(StoreCall::FilmWorkRows {
            ids: film_work_ids.to_vec(),
        });
        state.take_failure()?;
        Ok(state.tables.film_work_rows(film_work_ids))
    }
}
