//! The generic entity service: schema-bound CRUD over a document store.
//!
//! Every operation runs the same path:
//!
//! - The capability gate rejects operations the service was not declared
//!   with, before any store access happens.
//! - Filters go through the query formatter, which validates fields and
//!   operators against the collection schema.
//! - Documents leaving the service go through the serializer, which strips
//!   the collection's excluded fields.
//!
//! The service is generic over a write model `T` (what callers hand in) and
//! a read model `I` (what they get back). Both sides are plain serde types;
//! using [`serde_json::Value`] for either keeps the service schemaless.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use rewind_model::{
    get_str, is_reserved_field, CollectionSchema, FieldKind, JsonObject, FIELD_ID,
};
use rewind_storage::{DocumentStore, FindOptions, InsertMode, Query, Sort};
use rewind_types::{CapabilitySet, CrudOperation, PageMeta, PaginatedResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::formatter::{build_filter_query, format_list, ListRequest};
use crate::serializer::Serializer;

/// A CRUD service bound to one collection.
pub struct EntityService<T, I> {
    store: Arc<dyn DocumentStore>,
    schema: CollectionSchema,
    capabilities: CapabilitySet,
    serializer: Serializer,
    marker: PhantomData<fn(T) -> I>,
}

impl<T, I> Clone for EntityService<T, I> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            schema: self.schema.clone(),
            capabilities: self.capabilities,
            serializer: self.serializer.clone(),
            marker: PhantomData,
        }
    }
}

impl<T, I> EntityService<T, I>
where
    T: Serialize + Send + Sync,
    I: DeserializeOwned + Send,
{
    /// Binds a service to a collection. The capability set is an explicit
    /// declaration; operations outside it fail with
    /// [`EngineError::OperationNotAllowed`] no matter what the store could do.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        schema: CollectionSchema,
        capabilities: CapabilitySet,
        serializer: Serializer,
    ) -> Self {
        Self {
            store,
            schema,
            capabilities,
            serializer,
            marker: PhantomData,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    /// Creates the collection's physical layout if missing. Part of startup,
    /// not a gated operation.
    pub async fn prepare(&self) -> EngineResult<()> {
        Ok(self.store.ensure_collection(&self.schema).await?)
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// Counts documents matching the filters. A sentinel value drops its
    /// field from the filter; the count covers whatever remains.
    pub async fn count(&self, filters: &JsonObject) -> EngineResult<u64> {
        self.check(CrudOperation::Count)?;
        let (query, _) = build_filter_query(&self.schema, filters)?;
        Ok(self.store.count(&self.schema, &query).await?)
    }

    /// Whether any document matches the filters. A sentinel value makes this
    /// false without touching the store.
    pub async fn exists(&self, filters: &JsonObject) -> EngineResult<bool> {
        self.check(CrudOperation::Exists)?;
        let (query, sentinel) = build_filter_query(&self.schema, filters)?;
        if sentinel {
            return Ok(false);
        }
        Ok(self.store.exists(&self.schema, &query).await?)
    }

    /// One page of documents. The total counts against the field filters
    /// alone; a text clause narrows the page payload but never the total.
    /// A sentinel filter keeps the meta and empties the payload.
    pub async fn get_all(&self, request: &ListRequest) -> EngineResult<PaginatedResponse<I>> {
        self.check(CrudOperation::GetAll)?;
        let formatted = format_list(&self.schema, request)?;
        let total = self.store.count(&self.schema, &formatted.base).await?;
        let meta = PageMeta::new(formatted.page, formatted.page_size, total);
        if formatted.short_circuit {
            return Ok(PaginatedResponse::empty(meta));
        }
        let mut query = formatted.base;
        if let Some(text) = formatted.text {
            query = query.matching(text);
        }
        let options = FindOptions::page(formatted.skip, formatted.page_size, formatted.sort);
        let docs = self.store.find_many(&self.schema, &query, &options).await?;
        let payload = docs
            .into_iter()
            .map(|doc| self.into_entity(doc))
            .collect::<EngineResult<Vec<I>>>()?;
        Ok(PaginatedResponse::new(payload, meta))
    }

    /// The newest document matching the filters, or `None`. `exclude` strips
    /// extra fields beyond the serializer's list for this call only.
    pub async fn find_single(
        &self,
        filters: &JsonObject,
        exclude: &[&str],
        populate: &[&str],
    ) -> EngineResult<Option<I>> {
        self.check(CrudOperation::FindSingle)?;
        let (query, sentinel) = build_filter_query(&self.schema, filters)?;
        if sentinel {
            return Ok(None);
        }
        let Some(found) = self.store.find_one(&self.schema, &query).await? else {
            return Ok(None);
        };
        let mut docs = [found];
        if !populate.is_empty() {
            self.apply_populate(&mut docs, populate).await?;
        }
        let [doc] = docs;
        let pruned = self.serializer.prune_with(doc, exclude);
        Ok(Some(serde_json::from_value(Value::Object(pruned))?))
    }

    /// Fetches the documents whose `key` field takes each of `values`. Every
    /// requested value must resolve; any that do not produce
    /// [`EngineError::MissingKeys`] naming them.
    pub async fn find_many(
        &self,
        key: &str,
        values: &[Value],
        populate: &[&str],
    ) -> EngineResult<Vec<I>> {
        self.check(CrudOperation::FindMany)?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::all().within(key, values.to_vec());
        let docs = self
            .store
            .find_many(&self.schema, &query, &FindOptions::default())
            .await?;
        let mut missing: Vec<String> = Vec::new();
        for value in values {
            if docs.iter().any(|doc| doc_matches_key(doc, key, value)) {
                continue;
            }
            let rendered = value_key(value);
            if !missing.contains(&rendered) {
                missing.push(rendered);
            }
        }
        if !missing.is_empty() {
            return Err(EngineError::MissingKeys {
                key: key.to_string(),
                missing,
            });
        }
        self.finish_docs(docs, populate).await
    }

    /// Full-text search over the collection's searchable fields, best match
    /// first. The text index is rebuilt before querying so hits reflect the
    /// current live documents. Blank input is an empty result, not an error.
    pub async fn search(&self, text: &str) -> EngineResult<Vec<I>> {
        self.check(CrudOperation::Search)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        self.store.sync_indexes(&self.schema).await?;
        let query = Query::all().matching(trimmed);
        let options = FindOptions {
            sort: Sort::Relevance,
            ..FindOptions::default()
        };
        let docs = self.store.find_many(&self.schema, &query, &options).await?;
        docs.into_iter().map(|doc| self.into_entity(doc)).collect()
    }

    // ── Writes ───────────────────────────────────────────────────────────

    /// Stores one document and returns it materialized.
    pub async fn create(&self, payload: &T, populate: &[&str]) -> EngineResult<I> {
        self.check(CrudOperation::Create)?;
        let doc = to_object(payload)?;
        let stored = self.store.insert_one(&self.schema, doc).await?;
        debug!(
            collection = %self.schema.collection,
            id = get_str(&stored, FIELD_ID).unwrap_or_default(),
            "document created"
        );
        let mut docs = [stored];
        if !populate.is_empty() {
            self.apply_populate(&mut docs, populate).await?;
        }
        let [doc] = docs;
        self.into_entity(doc)
    }

    /// Stores a batch in order, stopping at the first failing row. Rows
    /// before the failure remain stored.
    pub async fn bulk_create(&self, payloads: &[T]) -> EngineResult<Vec<I>> {
        self.check(CrudOperation::BulkCreate)?;
        if payloads.is_empty() {
            return Ok(Vec::new());
        }
        let docs = payloads
            .iter()
            .map(to_object)
            .collect::<EngineResult<Vec<_>>>()?;
        let outcome = self
            .store
            .insert_many(&self.schema, docs, InsertMode::Ordered)
            .await?;
        if let Some(failure) = outcome.failures.first() {
            return Err(EngineError::BulkWrite {
                index: failure.index,
                reason: failure.reason.clone(),
            });
        }
        outcome
            .inserted
            .into_iter()
            .map(|doc| self.into_entity(doc))
            .collect()
    }

    /// Returns the document whose `key` field matches the payload's value,
    /// inserting the payload when nothing matches. The probe and insert run
    /// in one transaction; losing a race to a concurrent writer falls back
    /// to returning the winner's document.
    pub async fn find_or_create(&self, payload: &T, key: &str) -> EngineResult<I> {
        self.check(CrudOperation::FindOrCreate)?;
        let doc = to_object(payload)?;
        let Some(value) = doc.get(key).cloned() else {
            return Err(EngineError::InvalidPayload(format!(
                "find-or-create payload is missing its `{key}` field"
            )));
        };
        let probe = Query::all().eq(key, value);
        let (stored, created) = match self.store.upsert_one(&self.schema, &probe, doc).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_duplicate() => {
                match self.store.find_one(&self.schema, &probe).await? {
                    Some(winner) => (winner, false),
                    None => return Err(err.into()),
                }
            }
            Err(err) => return Err(err.into()),
        };
        if created {
            debug!(
                collection = %self.schema.collection,
                key,
                "document created by find-or-create"
            );
        }
        self.into_entity(stored)
    }

    /// Resolves each identifier to the document whose `key` field equals it,
    /// creating minimal documents for the identifiers that are missing.
    /// Creation is best effort: a failing row is logged and skipped, the
    /// rest go through.
    pub async fn find_many_or_create_many(
        &self,
        key: &str,
        identifiers: &[Value],
    ) -> EngineResult<Vec<I>> {
        self.check(CrudOperation::FindManyOrCreateMany)?;
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        let mut wanted: Vec<Value> = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            if !wanted.contains(identifier) {
                wanted.push(identifier.clone());
            }
        }
        let query = Query::all().within(key, wanted.clone());
        let existing = self
            .store
            .find_many(&self.schema, &query, &FindOptions::default())
            .await?;
        let have: HashSet<String> = existing
            .iter()
            .filter_map(|doc| doc.get(key))
            .map(value_key)
            .collect();
        let to_insert: Vec<JsonObject> = wanted
            .iter()
            .filter(|identifier| !have.contains(&value_key(identifier)))
            .map(|identifier| {
                let mut doc = JsonObject::new();
                doc.insert(key.to_string(), identifier.clone());
                doc
            })
            .collect();
        let mut combined = existing;
        if !to_insert.is_empty() {
            let outcome = self
                .store
                .insert_many(&self.schema, to_insert, InsertMode::Unordered)
                .await?;
            for failure in &outcome.failures {
                warn!(
                    collection = %self.schema.collection,
                    index = failure.index,
                    reason = %failure.reason,
                    "find-many-or-create-many row failed, continuing"
                );
            }
            combined.extend(outcome.inserted);
        }
        combined
            .into_iter()
            .map(|doc| self.into_entity(doc))
            .collect()
    }

    /// Merges `changes` into the newest document matching the filters and
    /// returns the updated document, or `None` when nothing matches. Change
    /// keys must be declared fields; lifecycle fields cannot be written.
    pub async fn update(
        &self,
        filters: &JsonObject,
        changes: &JsonObject,
    ) -> EngineResult<Option<I>> {
        self.check(CrudOperation::Update)?;
        let (query, sentinel) = build_filter_query(&self.schema, filters)?;
        if sentinel {
            return Ok(None);
        }
        for field in changes.keys() {
            if is_reserved_field(field) || self.schema.field(field).is_none() {
                return Err(EngineError::UnknownUpdateField(field.clone()));
            }
        }
        let Some(updated) = self.store.update_one(&self.schema, &query, changes).await? else {
            return Ok(None);
        };
        self.into_entity(updated).map(Some)
    }

    /// Soft-deletes by id. Returns false when the id is unknown or the
    /// document is already deleted; repeating the call is harmless.
    pub async fn soft_delete(&self, id: &str) -> EngineResult<bool> {
        self.check(CrudOperation::SoftDelete)?;
        Ok(self.store.mark_deleted(&self.schema, id).await?)
    }

    /// Physically removes a document by id.
    pub async fn delete(&self, id: &str) -> EngineResult<bool> {
        self.check(CrudOperation::Delete)?;
        Ok(self.store.delete_by_id(&self.schema, id).await?)
    }

    // ── Maintenance ──────────────────────────────────────────────────────

    pub async fn sync_indexes(&self) -> EngineResult<()> {
        self.check(CrudOperation::SyncIndexes)?;
        Ok(self.store.sync_indexes(&self.schema).await?)
    }

    pub async fn drop_indexes(&self) -> EngineResult<()> {
        self.check(CrudOperation::DropIndexes)?;
        Ok(self.store.drop_indexes(&self.schema).await?)
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn check(&self, operation: CrudOperation) -> EngineResult<()> {
        if self.capabilities.allows(operation) {
            return Ok(());
        }
        warn!(
            collection = %self.schema.collection,
            operation = operation.as_str(),
            "operation rejected: not in this service's capability set"
        );
        Err(EngineError::OperationNotAllowed { operation })
    }

    async fn finish_docs(
        &self,
        mut docs: Vec<JsonObject>,
        populate: &[&str],
    ) -> EngineResult<Vec<I>> {
        if !populate.is_empty() {
            self.apply_populate(&mut docs, populate).await?;
        }
        docs.into_iter().map(|doc| self.into_entity(doc)).collect()
    }

    fn into_entity(&self, doc: JsonObject) -> EngineResult<I> {
        let pruned = self.serializer.prune(doc);
        Ok(serde_json::from_value(Value::Object(pruned))?)
    }

    /// Replaces relation ids with the referenced documents. Scalar relations
    /// become the document or null; array relations keep only the ids that
    /// resolved. Referenced documents are pruned with this service's
    /// serializer before substitution.
    async fn apply_populate(&self, docs: &mut [JsonObject], paths: &[&str]) -> EngineResult<()> {
        for path in paths {
            let target = self.relation_target(path)?.to_string();
            let ids = collect_relation_ids(docs, path);
            if ids.is_empty() {
                continue;
            }
            // Id lookups never consult declared fields, so a bare schema
            // naming the target collection is enough.
            let target_schema = CollectionSchema::new(target, Vec::new());
            let query = Query::all().within(
                FIELD_ID,
                ids.iter().cloned().map(Value::String).collect(),
            );
            let found = self
                .store
                .find_many(&target_schema, &query, &FindOptions::default())
                .await?;
            let mut by_id: HashMap<String, Value> = HashMap::with_capacity(found.len());
            for doc in found {
                if let Some(id) = get_str(&doc, FIELD_ID).map(String::from) {
                    by_id.insert(id, Value::Object(self.serializer.prune(doc)));
                }
            }
            for doc in docs.iter_mut() {
                substitute_relation(doc, path, &by_id);
            }
        }
        Ok(())
    }

    fn relation_target(&self, path: &str) -> EngineResult<&str> {
        self.schema
            .field(path)
            .filter(|f| f.kind == FieldKind::Relation)
            .and_then(|f| f.relation_target.as_deref())
            .ok_or_else(|| EngineError::InvalidPopulatePath(path.to_string()))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn to_object<T: Serialize>(payload: &T) -> EngineResult<JsonObject> {
    match serde_json::to_value(payload)? {
        Value::Object(map) => Ok(map),
        other => Err(EngineError::InvalidPayload(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Whether a stored document satisfies `key = value`, treating array fields
/// as containment.
fn doc_matches_key(doc: &JsonObject, key: &str, value: &Value) -> bool {
    match doc.get(key) {
        Some(Value::Array(items)) => items.contains(value),
        Some(stored) => stored == value,
        None => false,
    }
}

/// String form of a filter value, for set membership and error messages.
fn value_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn collect_relation_ids(docs: &[JsonObject], path: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for doc in docs {
        match doc.get(path) {
            Some(Value::String(id)) => ids.push(id.clone()),
            Some(Value::Array(items)) => {
                ids.extend(items.iter().filter_map(Value::as_str).map(String::from));
            }
            _ => {}
        }
    }
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn substitute_relation(doc: &mut JsonObject, path: &str, by_id: &HashMap<String, Value>) {
    let Some(current) = doc.get_mut(path) else {
        return;
    };
    match current {
        Value::String(id) => {
            let resolved = by_id.get(id.as_str()).cloned().unwrap_or(Value::Null);
            *current = resolved;
        }
        Value::Array(items) => {
            let resolved = items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|id| by_id.get(id).cloned())
                .collect();
            *items = resolved;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn to_object_rejects_non_objects() {
        let err = to_object(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPayload(msg) if msg.contains("an array")));
    }

    #[test]
    fn doc_matches_key_handles_scalars_and_arrays() {
        let doc: JsonObject =
            serde_json::from_value(json!({ "puuid": "p1", "matchIds": ["a", "b"] })).unwrap();
        assert!(doc_matches_key(&doc, "puuid", &json!("p1")));
        assert!(!doc_matches_key(&doc, "puuid", &json!("p2")));
        assert!(doc_matches_key(&doc, "matchIds", &json!("b")));
        assert!(!doc_matches_key(&doc, "matchIds", &json!("c")));
        assert!(!doc_matches_key(&doc, "absent", &json!("x")));
    }

    #[test]
    fn relation_ids_are_collected_and_deduped() {
        let docs: Vec<JsonObject> = vec![
            serde_json::from_value(json!({ "author": "u2" })).unwrap(),
            serde_json::from_value(json!({ "author": "u1", "tags": ["u9"] })).unwrap(),
            serde_json::from_value(json!({ "author": "u2" })).unwrap(),
        ];
        assert_eq!(collect_relation_ids(&docs, "author"), vec!["u1", "u2"]);
    }
}
