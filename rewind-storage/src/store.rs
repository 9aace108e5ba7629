//! Document store abstraction trait.
//!
//! Defines the narrow set of primitives the generic data-access layer needs
//! from a backing store. Implementations own the physical layout; callers see
//! JSON documents with the store-managed lifecycle fields filled in.

use crate::error::StoreResult;
use crate::query::{FindOptions, Query};
use async_trait::async_trait;
use rewind_model::{CollectionSchema, JsonObject};

/// Failure handling for batch inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Stop at the first failing row and surface its error. Rows inserted
    /// before the failure stay inserted.
    Ordered,
    /// Attempt every row; report per-row failures alongside the successes.
    Unordered,
}

/// Result of a batch insert.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Successfully inserted documents, materialized, in input order.
    pub inserted: Vec<JsonObject>,
    /// Rows that failed, by input index. Empty in ordered mode.
    pub failures: Vec<RowFailure>,
}

impl BatchOutcome {
    /// Whether every row made it in.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One failed row of an unordered batch insert.
#[derive(Debug, Clone)]
pub struct RowFailure {
    /// Index of the row in the input batch.
    pub index: usize,
    pub reason: String,
}

/// Abstract document store interface.
///
/// Every method takes the collection's schema; the store derives table names,
/// text-index feeds and unique constraints from it. Documents passed in hold
/// domain fields only; documents returned additionally carry `_id`,
/// `createdAt`, `updatedAt`, `isDeleted` and `deletedAt`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates the collection's physical layout if missing: table, unique
    /// indexes over live documents, text index when any field is searchable.
    async fn ensure_collection(&self, schema: &CollectionSchema) -> StoreResult<()>;

    /// Inserts one document and returns it materialized.
    async fn insert_one(&self, schema: &CollectionSchema, doc: JsonObject)
        -> StoreResult<JsonObject>;

    /// Inserts a batch of documents under the given failure mode.
    async fn insert_many(
        &self,
        schema: &CollectionSchema,
        docs: Vec<JsonObject>,
        mode: InsertMode,
    ) -> StoreResult<BatchOutcome>;

    /// Returns the first document matching the query, newest first.
    async fn find_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
    ) -> StoreResult<Option<JsonObject>>;

    /// Returns every document matching the query, honouring sort, skip and
    /// limit. Text-clause hits carry a `score` field, larger meaning more
    /// relevant.
    async fn find_many(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        options: &FindOptions,
    ) -> StoreResult<Vec<JsonObject>>;

    /// Merges `changes` into the first document matching the query and
    /// returns the post-update document, or `None` when nothing matched.
    async fn update_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        changes: &JsonObject,
    ) -> StoreResult<Option<JsonObject>>;

    /// Returns the first document matching the query, inserting `doc` if
    /// nothing matches. Probe and insert run in one transaction; the boolean
    /// is true when the document was created.
    async fn upsert_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        doc: JsonObject,
    ) -> StoreResult<(JsonObject, bool)>;

    /// Soft-deletes the live document with the given id. Returns false when
    /// the id is unknown or the document is already deleted.
    async fn mark_deleted(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool>;

    /// Physically removes a document regardless of its soft-delete state.
    async fn delete_by_id(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool>;

    /// Counts documents matching the query.
    async fn count(&self, schema: &CollectionSchema, query: &Query) -> StoreResult<u64>;

    /// Whether at least one document matches the query.
    async fn exists(&self, schema: &CollectionSchema, query: &Query) -> StoreResult<bool>;

    /// Rebuilds the collection's indexes from its live documents.
    async fn sync_indexes(&self, schema: &CollectionSchema) -> StoreResult<()>;

    /// Drops the collection's secondary indexes. Text queries fail until the
    /// next [`DocumentStore::sync_indexes`].
    async fn drop_indexes(&self, schema: &CollectionSchema) -> StoreResult<()>;
}
