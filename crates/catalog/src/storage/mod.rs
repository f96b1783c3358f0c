//! Storage traits and implementations
//!
//! This module defines the storage abstraction layer for catalog records.
//! The trait-based design allows swapping between in-memory and SQLite
//! storage implementations.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;
pub use traits::CatalogStore;
