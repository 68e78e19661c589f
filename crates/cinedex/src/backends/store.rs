use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_config::StoreConfig;
use crate::backends::{in_mem, postgres};
use crate::common::{ChangedRow, EntityType, FilmCursor, RelationalRow};
use crate::retry::RetryPolicy;

/// 🐘 The relational side of the sync: three parameterized queries and nothing else.
///
/// # Contract 📜
/// - `changed_since`: rows of `entity`'s own table with `updated_at > since`, ascending by
///   `updated_at`, at most `limit` of them.
/// - `film_works_referencing`: films linked (through the entity's join table) to any of
///   `ids` that come strictly after `after` in `(updated_at, id)` order, in that order, at
///   most `limit`. Each film appears once, however many links tie it to the ids.
/// - `film_work_rows`: the flat outer join of the given films with their people and
///   genres, unpaged. Callers keep `film_work_ids` bounded by their own page size.
/// - Implementations own their reconnect + retry story. A returned `Err` means the
///   retries are already spent.
#[async_trait]
pub(crate) trait ContentStore: std::fmt::Debug + Send {
    async fn changed_since(
        &mut self,
        entity: EntityType,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangedRow>>;

    async fn film_works_referencing(
        &mut self,
        entity: EntityType,
        ids: &[Uuid],
        after: FilmCursor,
        limit: usize,
    ) -> Result<Vec<ChangedRow>>;

    async fn film_work_rows(&mut self, film_work_ids: &[Uuid]) -> Result<Vec<RelationalRow>>;
}

/// 🎭 Postgres in production, a heap of `Vec`s in tests. Same questions, same answers.
#[derive(Debug)]
pub(crate) enum StoreBackend {
    Postgres(postgres::PostgresStore),
    InMemory(in_mem::InMemoryStore),
}

impl StoreBackend {
    /// 🔧 Resolve the store from config. Postgres connects eagerly so a typo in the
    /// host name fails at startup, not at 3am on the first poll.
    pub(crate) async fn from_config(config: &StoreConfig, retry: RetryPolicy) -> Result<Self> {
        match config {
            StoreConfig::Postgres(pg) => Ok(Self::Postgres(
                postgres::PostgresStore::connect(pg.clone(), retry).await?,
            )),
            StoreConfig::InMemory(mem) => Ok(Self::InMemory(
                in_mem::InMemoryStore::from_config(mem).await?,
            )),
        }
    }
}

#[async_trait]
impl ContentStore for StoreBackend {
    async fn changed_since(
        &mut self,
        entity: EntityType,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangedRow>> {
        match self {
            StoreBackend::Postgres(store) => store.changed_since(entity, since, limit).await,
            StoreBackend::InMemory(store) => store.changed_since(entity, since, limit).await,
        }
    }

    async fn film_works_referencing(
        &mut self,
        entity: EntityType,
        ids: &[Uuid],
        after: FilmCursor,
        limit: usize,
    ) -> Result<Vec<ChangedRow>> {
        match self {
            StoreBackend::Postgres(store) => {
                store.film_works_referencing(entity, ids, after, limit).await
            }
            StoreBackend::InMemory(store) => {
                store.film_works_referencing(entity, ids, after, limit).await
            }
        }
    }

    async fn film_work_rows(&mut self, film_work_ids: &[Uuid]) -> Result<Vec<RelationalRow>> {
        match self {
            StoreBackend::Postgres(store) => store.film_work_rows(film_work_ids).await,
            StoreBackend::InMemory(store) => store.film_work_rows(film_work_ids).await,
        }
    }
}
