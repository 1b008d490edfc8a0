//! Storage backends for stratum.
//!
//! A [`Store`] persists serialized [`Record`]s and serves the four calls a
//! layer dispatches to it: `load`, `save`, `delete` and `find`. Two
//! reference backends are provided:
//!
//! - [`MemoryStore`]: a process-local map, mostly useful for tests
//! - [`SqliteStore`]: records kept as JSON rows in one SQLite table
//!
//! Both apply the same filtering, sorting, pagination and projection rules
//! (see [`query`]). Saves merge attributes into the stored record, last
//! writer wins; there is no conflict detection.

mod error;
mod memory;
pub mod query;
mod sqlite;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::Store;

pub use stratum_types::{DeleteRequest, FindQuery, FindRequest, LoadRequest, Record, SaveRequest};
