//! 🔌 Backends: where the real I/O happens.
//!
//! 🐘 The content store pours changed rows out of Postgres, 📡 the search index slurps
//! NDJSON into Elasticsearch, and 🔖 the offset store remembers how far we got so a
//! restart doesn't mean re-indexing the entire film history. Again.
//!
//! Each concern follows the same shape: trait → concrete impls → enum dispatcher.
//! The pipeline only ever sees the enum, so it never knows (or cares) whether it is
//! talking to a real cluster or a `BTreeMap` wearing a trench coat in a unit test.

pub(crate) mod elasticsearch;
pub(crate) mod file;
pub(crate) mod in_mem;
pub(crate) mod index;
pub(crate) mod offsets;
pub(crate) mod postgres;
pub(crate) mod store;

pub use elasticsearch::ElasticsearchIndexConfig;
pub use file::JsonFileOffsetsConfig;
pub use in_mem::{InMemoryIndexConfig, InMemoryStoreConfig};
pub use postgres::PostgresStoreConfig;

pub(crate) use index::{IndexBackend, SearchIndex};
pub(crate) use offsets::{OffsetBackend, OffsetStore};
pub(crate) use store::{ContentStore, StoreBackend};
