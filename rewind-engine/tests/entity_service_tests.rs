use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rewind_engine::{EngineError, EntityService, FilterError, ListRequest, Serializer};
use rewind_model::{CollectionSchema, FieldSpec, JsonObject};
use rewind_storage::{
    BatchOutcome, DocumentStore, FindOptions, InsertMode, Query, SqliteStore, StoreResult,
};
use rewind_types::{CapabilitySet, CrudOperation};
use serde_json::{json, Value};

fn accounts_schema() -> CollectionSchema {
    CollectionSchema::new(
        "accounts",
        vec![
            FieldSpec::text("puuid", false).unique(),
            FieldSpec::text("gameName", true),
            FieldSpec::text("tagLine", true),
            FieldSpec::tags("matchIds"),
        ],
    )
}

fn lifecycle_serializer() -> Serializer {
    Serializer::new(["createdAt", "updatedAt", "deletedAt", "isDeleted"])
}

async fn accounts_service() -> EntityService<Value, Value> {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let service = EntityService::new(
        store,
        accounts_schema(),
        CapabilitySet::all(),
        lifecycle_serializer(),
    );
    service.prepare().await.unwrap();
    service
}

fn account(puuid: &str, game_name: &str, tag_line: &str, match_ids: &[&str]) -> Value {
    json!({
        "puuid": puuid,
        "gameName": game_name,
        "tagLine": tag_line,
        "matchIds": match_ids,
    })
}

fn filters(value: Value) -> JsonObject {
    serde_json::from_value(value).unwrap()
}

// ─── Capability gate ───────────────────────────────────────────────────────

/// Store decorator that counts every call that reaches it.
struct RecordingStore {
    inner: SqliteStore,
    calls: AtomicUsize,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> StoreResult<()> {
        self.record();
        self.inner.ensure_collection(schema).await
    }

    async fn insert_one(
        &self,
        schema: &CollectionSchema,
        doc: JsonObject,
    ) -> StoreResult<JsonObject> {
        self.record();
        self.inner.insert_one(schema, doc).await
    }

    async fn insert_many(
        &self,
        schema: &CollectionSchema,
        docs: Vec<JsonObject>,
        mode: InsertMode,
    ) -> StoreResult<BatchOutcome> {
        self.record();
        self.inner.insert_many(schema, docs, mode).await
    }

    async fn find_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
    ) -> StoreResult<Option<JsonObject>> {
        self.record();
        self.inner.find_one(schema, query).await
    }

    async fn find_many(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        options: &FindOptions,
    ) -> StoreResult<Vec<JsonObject>> {
        self.record();
        self.inner.find_many(schema, query, options).await
    }

    async fn update_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        changes: &JsonObject,
    ) -> StoreResult<Option<JsonObject>> {
        self.record();
        self.inner.update_one(schema, query, changes).await
    }

    async fn upsert_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        doc: JsonObject,
    ) -> StoreResult<(JsonObject, bool)> {
        self.record();
        self.inner.upsert_one(schema, query, doc).await
    }

    async fn mark_deleted(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool> {
        self.record();
        self.inner.mark_deleted(schema, id).await
    }

    async fn delete_by_id(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool> {
        self.record();
        self.inner.delete_by_id(schema, id).await
    }

    async fn count(&self, schema: &CollectionSchema, query: &Query) -> StoreResult<u64> {
        self.record();
        self.inner.count(schema, query).await
    }

    async fn exists(&self, schema: &CollectionSchema, query: &Query) -> StoreResult<bool> {
        self.record();
        self.inner.exists(schema, query).await
    }

    async fn sync_indexes(&self, schema: &CollectionSchema) -> StoreResult<()> {
        self.record();
        self.inner.sync_indexes(schema).await
    }

    async fn drop_indexes(&self, schema: &CollectionSchema) -> StoreResult<()> {
        self.record();
        self.inner.drop_indexes(schema).await
    }
}

#[tokio::test]
async fn denied_operations_never_reach_the_store() {
    let recorder = Arc::new(RecordingStore::new());
    let service: EntityService<Value, Value> = EntityService::new(
        Arc::clone(&recorder) as Arc<dyn DocumentStore>,
        accounts_schema(),
        CapabilitySet::from_ops(&[CrudOperation::Count]),
        Serializer::default(),
    );

    let err = service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "operation create not allowed");
    assert!(matches!(
        err,
        EngineError::OperationNotAllowed {
            operation: CrudOperation::Create
        }
    ));

    let err = service.search("faker").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::OperationNotAllowed {
            operation: CrudOperation::Search
        }
    ));

    let err = service.soft_delete("some-id").await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::OperationNotAllowed {
            operation: CrudOperation::SoftDelete
        }
    ));

    assert_eq!(recorder.calls(), 0);
}

// ─── Create and paginate ───────────────────────────────────────────────────

#[tokio::test]
async fn create_then_page_returns_the_account() {
    let service = accounts_service().await;

    let created = service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    assert_eq!(created["puuid"], json!("p1"));
    assert!(created.get("createdAt").is_none());

    let page = service
        .get_all(
            &ListRequest::new()
                .page(1)
                .page_size(5)
                .filter("gameName", json!("Faker")),
        )
        .await
        .unwrap();
    assert_eq!(page.payload.len(), 1);
    assert_eq!(page.payload[0]["gameName"], json!("Faker"));
    assert!(page.payload[0].get("isDeleted").is_none());
    assert_eq!(page.meta.page, 1);
    assert_eq!(page.meta.total, 1);
    assert_eq!(page.meta.page_size, 5);
    assert_eq!(page.meta.total_pages, 1);
}

#[tokio::test]
async fn pages_do_not_overlap_and_defaults_apply() {
    let service = accounts_service().await;
    for i in 0..7 {
        service
            .create(&account(&format!("p{i}"), "Player", "T1", &[]), &[])
            .await
            .unwrap();
    }

    let first = service.get_all(&ListRequest::new()).await.unwrap();
    assert_eq!(first.meta.page, 1);
    assert_eq!(first.meta.page_size, 5);
    assert_eq!(first.meta.total, 7);
    assert_eq!(first.meta.total_pages, 2);
    assert_eq!(first.payload.len(), 5);

    let second = service.get_all(&ListRequest::new().page(2)).await.unwrap();
    assert_eq!(second.payload.len(), 2);

    let mut ids: Vec<String> = first
        .payload
        .iter()
        .chain(second.payload.iter())
        .map(|doc| doc["_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 7);
}

#[tokio::test]
async fn text_search_narrows_the_payload_but_not_the_total() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    service
        .create(&account("p2", "Faker", "KR2", &[]), &[])
        .await
        .unwrap();
    service
        .create(&account("p3", "Chovy", "KR1", &[]), &[])
        .await
        .unwrap();

    let page = service
        .get_all(&ListRequest::new().search("Faker"))
        .await
        .unwrap();
    assert_eq!(page.meta.total, 3);
    assert_eq!(page.payload.len(), 2);
    for doc in &page.payload {
        assert_eq!(doc["gameName"], json!("Faker"));
    }
}

// ─── Sentinel short-circuit ────────────────────────────────────────────────

#[tokio::test]
async fn nil_sentinel_short_circuits_with_meta_intact() {
    let service = accounts_service().await;
    for i in 0..3 {
        service
            .create(&account(&format!("p{i}"), "Faker", "KR1", &[]), &[])
            .await
            .unwrap();
    }

    let page = service
        .get_all(&ListRequest::new().filter("puuid", json!("nil")))
        .await
        .unwrap();
    assert!(page.payload.is_empty());
    // The sentinel field is dropped before counting, so the total covers
    // the remaining filters.
    assert_eq!(page.meta.total, 3);
    assert_eq!(page.meta.total_pages, 1);

    assert!(!service
        .exists(&filters(json!({ "puuid": "nil" })))
        .await
        .unwrap());
    assert_eq!(
        service.count(&filters(json!({ "puuid": "nil" }))).await.unwrap(),
        3
    );
    assert!(service
        .find_single(&filters(json!({ "puuid": "nil" })), &[], &[])
        .await
        .unwrap()
        .is_none());
    assert!(service
        .update(
            &filters(json!({ "puuid": "nil" })),
            &filters(json!({ "gameName": "X" })),
        )
        .await
        .unwrap()
        .is_none());
}

// ─── Filter validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_filter_fields_are_rejected() {
    let service = accounts_service().await;
    let err = service
        .count(&filters(json!({ "rank": "Challenger" })))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Filter(FilterError::UnknownField(f)) if f == "rank"));
}

#[tokio::test]
async fn only_the_in_operator_is_accepted() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();

    let hits = service
        .count(&filters(json!({ "puuid": { "$in": ["p1", "p2"] } })))
        .await
        .unwrap();
    assert_eq!(hits, 1);

    let err = service
        .count(&filters(json!({ "puuid": { "$gt": "a" } })))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Filter(FilterError::UnsupportedOperator { field, operator })
            if field == "puuid" && operator == "$gt"
    ));
}

#[tokio::test]
async fn scalar_filters_on_array_fields_match_containment() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &["KR_1", "KR_2"]), &[])
        .await
        .unwrap();
    service
        .create(&account("p2", "Chovy", "KR1", &["KR_3"]), &[])
        .await
        .unwrap();

    assert_eq!(
        service
            .count(&filters(json!({ "matchIds": "KR_2" })))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        service
            .count(&filters(json!({ "matchIds": ["KR_2", "KR_3"] })))
            .await
            .unwrap(),
        2
    );
}

// ─── Single and keyed fetches ──────────────────────────────────────────────

#[tokio::test]
async fn find_single_applies_call_level_exclusions() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &["KR_1"]), &[])
        .await
        .unwrap();

    let found = service
        .find_single(&filters(json!({ "puuid": "p1" })), &["matchIds"], &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["gameName"], json!("Faker"));
    assert!(found.get("matchIds").is_none());
    assert!(found.get("createdAt").is_none());

    // The exclusion is per call, not sticky.
    let found = service
        .find_single(&filters(json!({ "puuid": "p1" })), &[], &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["matchIds"], json!(["KR_1"]));
}

#[tokio::test]
async fn find_many_requires_every_key_to_resolve() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    service
        .create(&account("p2", "Chovy", "KR1", &[]), &[])
        .await
        .unwrap();

    let found = service
        .find_many("puuid", &[json!("p1"), json!("p2")], &[])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let err = service
        .find_many("puuid", &[json!("p1"), json!("p9"), json!("p8")], &[])
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "The following keys were not found in the database: p9, p8"
    );
}

// ─── Find-or-create ────────────────────────────────────────────────────────

#[tokio::test]
async fn find_or_create_returns_the_existing_document() {
    let service = accounts_service().await;

    let first = service
        .find_or_create(&account("p1", "Faker", "KR1", &[]), "puuid")
        .await
        .unwrap();
    let second = service
        .find_or_create(&account("p1", "Ignored", "XX0", &[]), "puuid")
        .await
        .unwrap();

    assert_eq!(first["_id"], second["_id"]);
    assert_eq!(second["gameName"], json!("Faker"));
    assert_eq!(service.count(&JsonObject::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn find_or_create_rejects_payloads_missing_the_key() {
    let service = accounts_service().await;
    let err = service
        .find_or_create(&json!({ "gameName": "Faker" }), "puuid")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayload(_)));
}

#[tokio::test]
async fn find_many_or_create_many_creates_only_the_missing() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();

    let all = service
        .find_many_or_create_many(
            "puuid",
            &[json!("p1"), json!("p2"), json!("p3"), json!("p2")],
        )
        .await
        .unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(service.count(&JsonObject::new()).await.unwrap(), 3);
    let existing = all.iter().find(|doc| doc["puuid"] == json!("p1")).unwrap();
    assert_eq!(existing["gameName"], json!("Faker"));
    let created = all.iter().find(|doc| doc["puuid"] == json!("p2")).unwrap();
    assert!(created.get("gameName").is_none());
}

// ─── Bulk create ───────────────────────────────────────────────────────────

#[tokio::test]
async fn bulk_create_stops_at_the_first_failure() {
    let service = accounts_service().await;
    service
        .create(&account("dup", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();

    let err = service
        .bulk_create(&[
            account("p1", "A", "T1", &[]),
            account("dup", "B", "T2", &[]),
            account("p3", "C", "T3", &[]),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::BulkWrite { index: 1, .. }));
    // Rows before the failure remain; the rest were never attempted.
    assert_eq!(service.count(&JsonObject::new()).await.unwrap(), 2);
    assert!(!service
        .exists(&filters(json!({ "puuid": "p3" })))
        .await
        .unwrap());
}

// ─── Update ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_merges_declared_fields_only() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();

    let updated = service
        .update(
            &filters(json!({ "puuid": "p1" })),
            &filters(json!({ "matchIds": ["KR_1"], "tagLine": "KR2" })),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["matchIds"], json!(["KR_1"]));
    assert_eq!(updated["tagLine"], json!("KR2"));
    assert_eq!(updated["gameName"], json!("Faker"));

    let err = service
        .update(
            &filters(json!({ "puuid": "p1" })),
            &filters(json!({ "rank": 1 })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownUpdateField(f) if f == "rank"));

    let err = service
        .update(
            &filters(json!({ "puuid": "p1" })),
            &filters(json!({ "createdAt": 0 })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownUpdateField(f) if f == "createdAt"));

    assert!(service
        .update(
            &filters(json!({ "puuid": "p9" })),
            &filters(json!({ "tagLine": "X" })),
        )
        .await
        .unwrap()
        .is_none());
}

// ─── Deletion ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_hides_and_repeats_harmlessly() {
    let service = accounts_service().await;
    let created = service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    let id = created["_id"].as_str().unwrap().to_string();

    assert!(service.soft_delete(&id).await.unwrap());
    assert!(!service.soft_delete(&id).await.unwrap());

    assert_eq!(service.count(&JsonObject::new()).await.unwrap(), 0);
    assert!(!service
        .exists(&filters(json!({ "puuid": "p1" })))
        .await
        .unwrap());
    assert!(service
        .find_single(&filters(json!({ "puuid": "p1" })), &[], &[])
        .await
        .unwrap()
        .is_none());

    // The unique value is released; a new account can claim it.
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_removes_physically() {
    let service = accounts_service().await;
    let created = service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    let id = created["_id"].as_str().unwrap().to_string();

    assert!(service.delete(&id).await.unwrap());
    assert!(!service.delete(&id).await.unwrap());
    assert_eq!(service.count(&JsonObject::new()).await.unwrap(), 0);
}

// ─── Search ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_ranks_best_matches_first() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    service
        .create(&account("p2", "Faker", "Faker", &[]), &[])
        .await
        .unwrap();
    service
        .create(&account("p3", "Chovy", "KR1", &[]), &[])
        .await
        .unwrap();

    let hits = service.search("Faker").await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["puuid"], json!("p2"));
    assert!(hits[0]["score"].as_f64().unwrap() >= hits[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn blank_search_is_an_empty_result() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    assert!(service.search("   ").await.unwrap().is_empty());
}

#[tokio::test]
async fn search_resyncs_dropped_indexes() {
    let service = accounts_service().await;
    service
        .create(&account("p1", "Faker", "KR1", &[]), &[])
        .await
        .unwrap();
    service.drop_indexes().await.unwrap();

    let hits = service.search("Faker").await.unwrap();
    assert_eq!(hits.len(), 1);
}

// ─── Populate ──────────────────────────────────────────────────────────────

fn authors_schema() -> CollectionSchema {
    CollectionSchema::new("authors", vec![FieldSpec::text("name", true)])
}

fn reviews_schema() -> CollectionSchema {
    CollectionSchema::new(
        "reviews",
        vec![
            FieldSpec::text("title", false),
            FieldSpec::relation("author", "authors"),
            FieldSpec::relation("contributors", "authors"),
        ],
    )
}

#[tokio::test]
async fn populate_replaces_relation_ids_with_documents() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let authors: EntityService<Value, Value> = EntityService::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        authors_schema(),
        CapabilitySet::all(),
        lifecycle_serializer(),
    );
    let reviews: EntityService<Value, Value> = EntityService::new(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        reviews_schema(),
        CapabilitySet::all(),
        lifecycle_serializer(),
    );
    authors.prepare().await.unwrap();
    reviews.prepare().await.unwrap();

    let author = authors.create(&json!({ "name": "Rioter" }), &[]).await.unwrap();
    let author_id = author["_id"].as_str().unwrap();

    reviews
        .create(
            &json!({
                "title": "patch notes",
                "author": author_id,
                "contributors": [author_id, "missing"],
            }),
            &[],
        )
        .await
        .unwrap();
    reviews
        .create(
            &json!({ "title": "hotfix", "author": "ghost", "contributors": [] }),
            &[],
        )
        .await
        .unwrap();

    let found = reviews
        .find_single(
            &filters(json!({ "title": "patch notes" })),
            &[],
            &["author", "contributors"],
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["author"]["name"], json!("Rioter"));
    assert!(found["author"].get("createdAt").is_none());
    // Array relations keep only the ids that resolved.
    assert_eq!(found["contributors"].as_array().unwrap().len(), 1);
    assert_eq!(found["contributors"][0]["name"], json!("Rioter"));

    // A dangling scalar relation resolves to null.
    let dangling = reviews
        .find_single(&filters(json!({ "title": "hotfix" })), &[], &["author"])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dangling["author"], Value::Null);

    let err = reviews
        .find_single(&filters(json!({ "title": "patch notes" })), &[], &["title"])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPopulatePath(p) if p == "title"));
}
