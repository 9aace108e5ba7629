//! Core type definitions for Rewind.
//!
//! This crate defines the fundamental, domain-agnostic types used throughout
//! the backend:
//! - Document identifiers (UUID v7)
//! - The CRUD operation registry and capability sets
//! - Pagination envelopes shared by every list endpoint
//!
//! Domain-specific types (player accounts, match stats, narrative payloads)
//! belong in the service crates, not here.

mod capability;
mod ids;
mod page;

pub use capability::{CapabilityError, CapabilitySet, CrudOperation};
pub use ids::DocumentId;
pub use page::{PageMeta, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};

/// Sentinel filter value treated as an intentional no-match probe.
///
/// A list query that binds any filter field to this value short-circuits to an
/// empty page instead of hitting the store with an impossible predicate.
pub const NIL_SENTINEL: &str = "nil";
