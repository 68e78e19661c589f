//! 🧪 Building blocks for tests: timestamps, table rows, and wiring over in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::app_config::RuntimeConfig;
use crate::backends::in_mem::{
    FilmWorkRecord, GenreFilmWorkRecord, GenreRecord, InMemoryIndex, InMemoryOffsets,
    InMemoryStore, PersonFilmWorkRecord, PersonRecord,
};
use crate::backends::{IndexBackend, OffsetBackend, StoreBackend};
use crate::pipeline::{SharedOffsets, SharedStore};
use crate::retry::RetryConfig;

/// ⏰ A fixed instant plus `seconds`, so test timestamps read like a timeline.
pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap_or_default()
}

pub(crate) fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub(crate) fn film(n: u128, title: &str, updated: i64) -> FilmWorkRecord {
    FilmWorkRecord {
        id: id(n),
        title: title.to_string(),
        description: None,
        rating: Some(7.0),
        film_type: Some("movie".to_string()),
        created_at: Some(at(0)),
        updated_at: at(updated),
    }
}

pub(crate) fn person(n: u128, full_name: &str, updated: i64) -> PersonRecord {
    PersonRecord {
        id: id(n),
        full_name: full_name.to_string(),
        updated_at: at(updated),
    }
}

pub(crate) fn genre(n: u128, name: &str, updated: i64) -> GenreRecord {
    GenreRecord {
        id: id(n),
        name: name.to_string(),
        updated_at: at(updated),
    }
}

pub(crate) fn cast(film: u128, person: u128, role: &str) -> PersonFilmWorkRecord {
    PersonFilmWorkRecord {
        film_work_id: id(film),
        person_id: id(person),
        role: role.to_string(),
    }
}

pub(crate) fn tagged(film: u128, genre: u128) -> GenreFilmWorkRecord {
    GenreFilmWorkRecord {
        film_work_id: id(film),
        genre_id: id(genre),
    }
}

/// ⏱️ Default runtime knobs, with a retry policy that doesn't make tests wait.
pub(crate) fn impatient_runtime(page_limit: usize) -> RuntimeConfig {
    RuntimeConfig {
        page_limit,
        retry: RetryConfig {
            initial_interval_ms: 1,
            ..RetryConfig::default()
        },
        ..RuntimeConfig::default()
    }
}

pub(crate) fn short_poll() -> Duration {
    Duration::from_millis(10)
}

/// 🧠 Shared backends over an in-memory store and index. The returned handles see
/// everything the pipeline does.
pub(crate) fn shared_backends(
    store: &InMemoryStore,
    index: &InMemoryIndex,
) -> (SharedStore, Arc<IndexBackend>, SharedOffsets) {
    (
        Arc::new(Mutex::new(StoreBackend::InMemory(store.clone()))),
        Arc::new(IndexBackend::InMemory(index.clone())),
        Arc::new(Mutex::new(OffsetBackend::InMemory(InMemoryOffsets::default()))),
    )
}
