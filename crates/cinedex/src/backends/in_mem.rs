//! 🧠 In-memory backends. No sockets, no disks, no excuses.
//!
//! 🎬 Every backend concern gets a stand-in here: a content store made of `Vec`s, a
//! search index made of `BTreeMap`s, and an offset store made of one `HashMap`. They
//! behave like the real thing where it matters (ordering, paging, outer joins, bulk
//! responses) and they can be told to fail on cue, which the real thing does for free.
//!
//! They also make `cinedex-cli` runnable without any infrastructure at all: point the
//! store at a JSON fixture, set the index to `in_memory`, and watch the logs.

use std::path::PathBuf;

use serde::Deserialize;

mod in_mem_index;
mod in_mem_offsets;
mod in_mem_store;

pub(crate) use in_mem_index::InMemoryIndex;
pub(crate) use in_mem_offsets::InMemoryOffsets;
pub(crate) use in_mem_store::InMemoryStore;

#[cfg(test)]
pub(crate) use in_mem_store::{
    ContentTables, FilmWorkRecord, GenreFilmWorkRecord, GenreRecord, PersonFilmWorkRecord,
    PersonRecord, StoreCall,
};

/// 🧠 Optional JSON fixture with the five content tables. Absent means empty tables.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct InMemoryStoreConfig {
    #[serde(default)]
    pub fixture: Option<PathBuf>,
}

/// 🧠 Nothing to configure. It's a map. It's always ready.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct InMemoryIndexConfig {}
