//! Stored document conventions and JSON access helpers.
//!
//! Every document the store manages carries these implicit fields alongside
//! its domain fields. They are set by the store, never by callers; the update
//! path rejects attempts to write them.

use serde_json::Value;

/// A stored document's JSON body.
pub type JsonObject = serde_json::Map<String, Value>;

/// Document id (UUID v7, assigned on insert).
pub const FIELD_ID: &str = "_id";
/// Insertion time, milliseconds since the Unix epoch.
pub const FIELD_CREATED_AT: &str = "createdAt";
/// Last mutation time, milliseconds since the Unix epoch.
pub const FIELD_UPDATED_AT: &str = "updatedAt";
/// Soft-delete flag. Deleted documents are invisible to normal reads.
pub const FIELD_IS_DELETED: &str = "isDeleted";
/// Soft-delete time, or null while the document is live.
pub const FIELD_DELETED_AT: &str = "deletedAt";
/// Text-search relevance, present only on search hits.
pub const FIELD_SCORE: &str = "score";

const RESERVED_FIELDS: &[&str] = &[
    FIELD_ID,
    FIELD_CREATED_AT,
    FIELD_UPDATED_AT,
    FIELD_IS_DELETED,
    FIELD_DELETED_AT,
    FIELD_SCORE,
];

/// Whether `name` is one of the store-managed fields.
#[must_use]
pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Reads a string field from a document.
#[must_use]
pub fn get_str<'a>(doc: &'a JsonObject, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

/// Reads an unsigned integer field from a document.
#[must_use]
pub fn get_u64(doc: &JsonObject, field: &str) -> Option<u64> {
    doc.get(field).and_then(Value::as_u64)
}

/// Reads an array field from a document.
#[must_use]
pub fn get_array<'a>(doc: &'a JsonObject, field: &str) -> Option<&'a Vec<Value>> {
    doc.get(field).and_then(Value::as_array)
}
