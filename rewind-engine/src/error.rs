//! Error types for the data-access layer.

use rewind_storage::StoreError;
use rewind_types::CrudOperation;
use thiserror::Error;

/// Result type for data-access operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in data-access operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The service's capability set does not include the operation. Raised
    /// before any store access.
    #[error("operation {operation} not allowed")]
    OperationNotAllowed { operation: CrudOperation },

    /// A filter failed validation against the collection schema.
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    /// A keyed multi-fetch could not resolve every requested value.
    #[error("The following keys were not found in the database: {}", .missing.join(", "))]
    MissingKeys { key: String, missing: Vec<String> },

    /// A populate path does not name a declared relation field.
    #[error("cannot populate `{0}`: not a declared relation field")]
    InvalidPopulatePath(String),

    /// An update payload wrote a field the schema does not declare.
    #[error("unknown field `{0}` in update payload")]
    UnknownUpdateField(String),

    /// A payload could not be turned into a stored document.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// An ordered bulk write stopped at a failing row. Rows before it
    /// remain stored.
    #[error("bulk write failed at row {index}: {reason}")]
    BulkWrite { index: usize, reason: String },

    /// Error from the document store.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Filter validation errors. Unknown fields and unsupported operators are
/// rejected up front instead of being silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown filter field `{0}`")]
    UnknownField(String),

    #[error("unsupported operator `{operator}` on field `{field}`")]
    UnsupportedOperator { field: String, operator: String },

    #[error("unsupported filter value for field `{0}`")]
    UnsupportedValue(String),
}
