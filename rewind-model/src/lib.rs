//! Collection schema model for Rewind.
//!
//! Defines the contract between the generic data-access layer and the
//! document store:
//! - [`CollectionSchema`]: declares a collection's domain fields
//! - [`FieldSpec`]: one declared field with kind, searchability and uniqueness
//! - Reserved lifecycle field names shared by every stored document
//!
//! Filter validation, membership-test rewriting, text indexing and unique
//! enforcement all key off these declarations. Domain payload types belong in
//! the service crates, not here.

mod doc;
mod schema;

pub use doc::{
    get_array, get_str, get_u64, is_reserved_field, JsonObject, FIELD_CREATED_AT,
    FIELD_DELETED_AT, FIELD_ID, FIELD_IS_DELETED, FIELD_SCORE, FIELD_UPDATED_AT,
};
pub use schema::{CollectionSchema, FieldKind, FieldSpec};
