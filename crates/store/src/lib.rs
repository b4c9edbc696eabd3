//! Storage backends for fan pair state, reward catalogs and the activity log.

#![warn(clippy::unwrap_used)]

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
