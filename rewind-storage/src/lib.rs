//! SQLite document store for Rewind.
//!
//! Persists schemaless JSON documents in named collections, one SQLite table
//! per collection. The generic data-access layer drives it through the
//! [`DocumentStore`] trait and never sees SQL.
//!
//! # Architecture
//!
//! - Documents are stored as JSON text plus lifecycle columns (creation,
//!   mutation and soft-delete times)
//! - Declared fields compile to `json_extract` filters; array fields compile
//!   to `json_each` membership probes
//! - Searchable fields feed a per-collection FTS5 index ranked with `bm25`
//! - Unique fields are enforced by partial indexes scoped to live rows

mod error;
mod query;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use query::{Clause, FindOptions, Query, Selector, Sort};
pub use sqlite::SqliteStore;
pub use store::{BatchOutcome, DocumentStore, InsertMode, RowFailure};
