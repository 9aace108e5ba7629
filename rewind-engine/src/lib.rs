//! Schema-driven data access for Rewind.
//!
//! This crate is the generic layer between domain services and the document
//! store. A domain binds an [`EntityService`] to a collection schema, an
//! explicit capability set and a serializer, then gets the full CRUD surface
//! with uniform behavior:
//!
//! - Operations outside the declared capability set are rejected before any
//!   store access
//! - Filters are validated against the schema, with a small operator
//!   allow-list and the `"nil"` sentinel short-circuit
//! - Paginated reads report totals over the field filters, text search
//!   narrows the payload only
//! - Outgoing documents are pruned by the collection's serializer
//!
//! The store behind a service is any [`rewind_storage::DocumentStore`].

mod error;
mod formatter;
mod serializer;
mod service;

pub use error::{EngineError, EngineResult, FilterError};
pub use formatter::ListRequest;
pub use serializer::Serializer;
pub use service::EntityService;
