//! Error types for the document store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Collection or field name is not a safe SQL identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Document payload violates the store's conventions.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A query referenced a field the collection does not declare.
    #[error("unknown field `{field}` in collection `{collection}`")]
    UnknownField { collection: String, field: String },

    /// A write collided with a unique index over live documents.
    #[error("duplicate value for unique field: {0}")]
    Duplicate(String),

    /// A text query ran against a collection whose text index was dropped.
    #[error("text index missing for collection `{0}`; run index sync first")]
    TextIndexMissing(String),
}

impl StoreError {
    /// Whether the error is a unique-index collision.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}
