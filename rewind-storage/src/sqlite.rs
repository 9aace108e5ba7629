//! SQLite-backed document store.
//!
//! One table per collection holds documents as JSON text plus lifecycle
//! columns. Filters on declared fields compile to `json_extract` (scalars) or
//! `json_each` membership probes (arrays). Searchable fields feed an FTS5
//! side table ranked with `bm25`; unique fields get partial expression
//! indexes scoped to live rows, so a soft-deleted document releases its
//! unique value.

use crate::error::{StoreError, StoreResult};
use crate::query::{Clause, FindOptions, Query, Selector, Sort};
use crate::store::{BatchOutcome, DocumentStore, InsertMode, RowFailure};
use async_trait::async_trait;
use chrono::Utc;
use rewind_model::{
    is_reserved_field, CollectionSchema, JsonObject, FIELD_CREATED_AT, FIELD_DELETED_AT, FIELD_ID,
    FIELD_IS_DELETED, FIELD_SCORE, FIELD_UPDATED_AT,
};
use rewind_types::DocumentId;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Document store backed by a single SQLite database file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

// ── Trait implementation ───────────────────────────────────────────────────

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> StoreResult<()> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        ensure_collection_sync(&conn, schema)?;
        debug!("ensured layout for collection {}", schema.collection);
        Ok(())
    }

    async fn insert_one(
        &self,
        schema: &CollectionSchema,
        doc: JsonObject,
    ) -> StoreResult<JsonObject> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        insert_doc(&conn, schema, &doc, epoch_ms())
    }

    async fn insert_many(
        &self,
        schema: &CollectionSchema,
        docs: Vec<JsonObject>,
        mode: InsertMode,
    ) -> StoreResult<BatchOutcome> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        let mut outcome = BatchOutcome::default();
        for (index, doc) in docs.iter().enumerate() {
            match insert_doc(&conn, schema, doc, epoch_ms()) {
                Ok(inserted) => outcome.inserted.push(inserted),
                Err(err) => match mode {
                    InsertMode::Ordered => return Err(err),
                    InsertMode::Unordered => {
                        warn!(
                            "batch insert into {} skipped row {index}: {err}",
                            schema.collection
                        );
                        outcome.failures.push(RowFailure {
                            index,
                            reason: err.to_string(),
                        });
                    }
                },
            }
        }
        Ok(outcome)
    }

    async fn find_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
    ) -> StoreResult<Option<JsonObject>> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::default()
        };
        Ok(find_many_sync(&conn, schema, query, &options)?.into_iter().next())
    }

    async fn find_many(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        options: &FindOptions,
    ) -> StoreResult<Vec<JsonObject>> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        find_many_sync(&conn, schema, query, options)
    }

    async fn update_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        changes: &JsonObject,
    ) -> StoreResult<Option<JsonObject>> {
        check_schema(schema)?;
        if let Some(key) = changes.keys().find(|k| is_reserved_field(k)) {
            return Err(StoreError::InvalidDocument(format!(
                "reserved field `{key}` in update payload"
            )));
        }
        let mut conn = self.conn.lock().await;
        update_one_sync(&mut conn, schema, query, changes)
    }

    async fn upsert_one(
        &self,
        schema: &CollectionSchema,
        query: &Query,
        doc: JsonObject,
    ) -> StoreResult<(JsonObject, bool)> {
        check_schema(schema)?;
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        if let Some(existing) = find_first_sync(&tx, schema, query)? {
            tx.commit()?;
            return Ok((existing, false));
        }
        let created = insert_doc(&tx, schema, &doc, epoch_ms())?;
        tx.commit()?;
        Ok((created, true))
    }

    async fn mark_deleted(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool> {
        check_schema(schema)?;
        let c = &schema.collection;
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let now = epoch_ms();
        let changed = tx.execute(
            &format!(
                "UPDATE \"{c}\" SET is_deleted = 1, deleted_at = ?1, updated_at = ?1 \
                 WHERE id = ?2 AND is_deleted = 0"
            ),
            params![now, id],
        )?;
        if changed > 0 && fts_exists(&tx, c)? {
            tx.execute(
                &format!("DELETE FROM \"{c}_fts\" WHERE doc_id = ?1"),
                params![id],
            )?;
        }
        tx.commit()?;
        Ok(changed > 0)
    }

    async fn delete_by_id(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool> {
        check_schema(schema)?;
        let c = &schema.collection;
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let changed = tx.execute(&format!("DELETE FROM \"{c}\" WHERE id = ?1"), params![id])?;
        if changed > 0 && fts_exists(&tx, c)? {
            tx.execute(
                &format!("DELETE FROM \"{c}_fts\" WHERE doc_id = ?1"),
                params![id],
            )?;
        }
        tx.commit()?;
        Ok(changed > 0)
    }

    async fn count(&self, schema: &CollectionSchema, query: &Query) -> StoreResult<u64> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        let c = &schema.collection;
        let match_expr = query.text.as_deref().and_then(build_match_expression);
        if match_expr.is_some() && !fts_exists(&conn, c)? {
            return Err(StoreError::TextIndexMissing(c.clone()));
        }
        let with_text = match_expr.is_some();
        let mut binds = Vec::new();
        let mut sql = format!("SELECT COUNT(*) {}", from_clause(c, with_text));
        sql.push_str(&render_where(schema, query, match_expr.as_deref(), &mut binds)?);
        let count: i64 = conn.query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    async fn exists(&self, schema: &CollectionSchema, query: &Query) -> StoreResult<bool> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        let c = &schema.collection;
        let match_expr = query.text.as_deref().and_then(build_match_expression);
        if match_expr.is_some() && !fts_exists(&conn, c)? {
            return Err(StoreError::TextIndexMissing(c.clone()));
        }
        let with_text = match_expr.is_some();
        let mut binds = Vec::new();
        let mut sql = format!("SELECT 1 {}", from_clause(c, with_text));
        sql.push_str(&render_where(schema, query, match_expr.as_deref(), &mut binds)?);
        sql.push_str(" LIMIT 1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        Ok(rows.next()?.is_some())
    }

    async fn sync_indexes(&self, schema: &CollectionSchema) -> StoreResult<()> {
        check_schema(schema)?;
        let mut conn = self.conn.lock().await;
        ensure_collection_sync(&conn, schema)?;
        if !schema.has_searchable_fields() {
            return Ok(());
        }
        let c = schema.collection.clone();
        let tx = conn.transaction()?;
        let rows = rebuild_fts_sync(&tx, schema)?;
        tx.commit()?;
        debug!("rebuilt text index for {c} over {rows} documents");
        Ok(())
    }

    async fn drop_indexes(&self, schema: &CollectionSchema) -> StoreResult<()> {
        check_schema(schema)?;
        let conn = self.conn.lock().await;
        let c = &schema.collection;
        for field in schema.unique_fields() {
            conn.execute_batch(&format!(
                "DROP INDEX IF EXISTS \"idx_{c}_{f}_unique\";",
                f = field.name
            ))?;
        }
        conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{c}_fts\";"))?;
        debug!("dropped secondary indexes for collection {c}");
        Ok(())
    }
}

// ── Schema DDL ─────────────────────────────────────────────────────────────

fn ensure_collection_sync(conn: &Connection, schema: &CollectionSchema) -> StoreResult<()> {
    let c = &schema.collection;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{c}\" (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at INTEGER
        );"
    ))?;
    for field in schema.unique_fields() {
        conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"idx_{c}_{f}_unique\"
             ON \"{c}\" (json_extract(data, '$.{f}')) WHERE is_deleted = 0;",
            f = field.name
        ))?;
    }
    if schema.has_searchable_fields() {
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS \"{c}_fts\" USING fts5(doc_id UNINDEXED, content);"
        ))?;
    }
    Ok(())
}

fn rebuild_fts_sync(conn: &Connection, schema: &CollectionSchema) -> StoreResult<usize> {
    let c = &schema.collection;
    conn.execute(&format!("DELETE FROM \"{c}_fts\""), [])?;
    let mut entries: Vec<(String, String)> = Vec::new();
    {
        let mut stmt =
            conn.prepare(&format!("SELECT id, data FROM \"{c}\" WHERE is_deleted = 0"))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let data: String = row.get(1)?;
            let parsed: Value = serde_json::from_str(&data)?;
            let Some(obj) = parsed.as_object() else {
                return Err(StoreError::InvalidDocument(format!(
                    "stored document {id} is not a JSON object"
                )));
            };
            entries.push((id, fts_content(schema, obj)));
        }
    }
    let total = entries.len();
    for (id, content) in entries {
        conn.execute(
            &format!("INSERT INTO \"{c}_fts\" (doc_id, content) VALUES (?1, ?2)"),
            params![id, content],
        )?;
    }
    Ok(total)
}

fn fts_exists(conn: &Connection, collection: &str) -> StoreResult<bool> {
    let name = format!("{collection}_fts");
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
    let mut rows = stmt.query(params![name])?;
    Ok(rows.next()?.is_some())
}

// ── Reads and writes ───────────────────────────────────────────────────────

fn insert_doc(
    conn: &Connection,
    schema: &CollectionSchema,
    doc: &JsonObject,
    now: i64,
) -> StoreResult<JsonObject> {
    if let Some(key) = doc.keys().find(|k| is_reserved_field(k)) {
        return Err(StoreError::InvalidDocument(format!(
            "reserved field `{key}` in insert payload"
        )));
    }
    let c = &schema.collection;
    let id = DocumentId::new().to_string();
    let data = serde_json::to_string(&Value::Object(doc.clone()))?;
    conn.execute(
        &format!(
            "INSERT INTO \"{c}\" (id, data, created_at, updated_at, is_deleted, deleted_at) \
             VALUES (?1, ?2, ?3, ?4, 0, NULL)"
        ),
        params![id, data, now, now],
    )
    .map_err(map_write_err)?;
    if schema.has_searchable_fields() && fts_exists(conn, c)? {
        conn.execute(
            &format!("INSERT INTO \"{c}_fts\" (doc_id, content) VALUES (?1, ?2)"),
            params![id, fts_content(schema, doc)],
        )?;
    }
    materialize(id, &data, now, now, 0, None, None)
}

fn find_many_sync(
    conn: &Connection,
    schema: &CollectionSchema,
    query: &Query,
    options: &FindOptions,
) -> StoreResult<Vec<JsonObject>> {
    let c = &schema.collection;
    let match_expr = match query.text.as_deref() {
        Some(text) => match build_match_expression(text) {
            Some(expr) => {
                if !fts_exists(conn, c)? {
                    return Err(StoreError::TextIndexMissing(c.clone()));
                }
                Some(expr)
            }
            // A blank text clause can never match anything.
            None => return Ok(Vec::new()),
        },
        None => None,
    };
    let with_text = match_expr.is_some();

    let mut binds = Vec::new();
    let mut sql = format!(
        "SELECT {} {}",
        select_columns(c, with_text),
        from_clause(c, with_text)
    );
    sql.push_str(&render_where(schema, query, match_expr.as_deref(), &mut binds)?);
    sql.push_str(&order_clause(c, options.sort, with_text));
    push_paging(&mut sql, &mut binds, options);

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut docs = Vec::new();
    while let Some(row) = rows.next()? {
        docs.push(read_doc_row(row, with_text)?);
    }
    Ok(docs)
}

/// First match in the store's default order, ignoring any text clause.
fn find_first_sync(
    conn: &Connection,
    schema: &CollectionSchema,
    query: &Query,
) -> StoreResult<Option<JsonObject>> {
    let c = &schema.collection;
    let mut binds = Vec::new();
    let mut sql = format!("SELECT {} {}", select_columns(c, false), from_clause(c, false));
    sql.push_str(&render_where(schema, query, None, &mut binds)?);
    sql.push_str(&order_clause(c, Sort::CreatedDesc, false));
    sql.push_str(" LIMIT 1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    match rows.next()? {
        Some(row) => Ok(Some(read_doc_row(row, false)?)),
        None => Ok(None),
    }
}

fn update_one_sync(
    conn: &mut Connection,
    schema: &CollectionSchema,
    query: &Query,
    changes: &JsonObject,
) -> StoreResult<Option<JsonObject>> {
    let c = schema.collection.clone();
    let tx = conn.transaction()?;

    let target = {
        let mut binds = Vec::new();
        let mut sql = format!(
            "SELECT {} {}",
            select_columns(&c, false),
            from_clause(&c, false)
        );
        sql.push_str(&render_where(schema, query, None, &mut binds)?);
        sql.push_str(&order_clause(&c, Sort::CreatedDesc, false));
        sql.push_str(" LIMIT 1");
        let mut stmt = tx.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        match rows.next()? {
            Some(row) => Some(RawRow::read(row)?),
            None => None,
        }
    };

    let Some(raw) = target else {
        return Ok(None);
    };

    let parsed: Value = serde_json::from_str(&raw.data)?;
    let Value::Object(mut domain) = parsed else {
        return Err(StoreError::InvalidDocument(format!(
            "stored document {} is not a JSON object",
            raw.id
        )));
    };
    for (key, value) in changes {
        domain.insert(key.clone(), value.clone());
    }
    let now = epoch_ms();
    let data = serde_json::to_string(&Value::Object(domain.clone()))?;
    tx.execute(
        &format!("UPDATE \"{c}\" SET data = ?1, updated_at = ?2 WHERE id = ?3"),
        params![data, now, raw.id],
    )
    .map_err(map_write_err)?;
    if schema.has_searchable_fields() && fts_exists(&tx, &c)? {
        let content = fts_content(schema, &domain);
        let touched = tx.execute(
            &format!("UPDATE \"{c}_fts\" SET content = ?1 WHERE doc_id = ?2"),
            params![content, raw.id],
        )?;
        if touched == 0 {
            tx.execute(
                &format!("INSERT INTO \"{c}_fts\" (doc_id, content) VALUES (?1, ?2)"),
                params![raw.id, content],
            )?;
        }
    }
    tx.commit()?;
    materialize(
        raw.id,
        &data,
        raw.created_at,
        now,
        raw.is_deleted,
        raw.deleted_at,
        None,
    )
    .map(Some)
}

struct RawRow {
    id: String,
    data: String,
    created_at: i64,
    is_deleted: i64,
    deleted_at: Option<i64>,
}

impl RawRow {
    fn read(row: &Row<'_>) -> StoreResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            data: row.get(1)?,
            created_at: row.get(2)?,
            is_deleted: row.get(4)?,
            deleted_at: row.get(5)?,
        })
    }
}

// ── SQL building ───────────────────────────────────────────────────────────

fn select_columns(c: &str, with_rank: bool) -> String {
    let mut cols = format!(
        "\"{c}\".id, \"{c}\".data, \"{c}\".created_at, \"{c}\".updated_at, \
         \"{c}\".is_deleted, \"{c}\".deleted_at"
    );
    if with_rank {
        cols.push_str(&format!(", bm25(\"{c}_fts\") AS rank"));
    }
    cols
}

fn from_clause(c: &str, with_text: bool) -> String {
    if with_text {
        format!("FROM \"{c}_fts\" JOIN \"{c}\" ON \"{c}\".id = \"{c}_fts\".doc_id")
    } else {
        format!("FROM \"{c}\"")
    }
}

fn render_where(
    schema: &CollectionSchema,
    query: &Query,
    match_expr: Option<&str>,
    binds: &mut Vec<SqlValue>,
) -> StoreResult<String> {
    let c = &schema.collection;
    let mut sql = String::from(" WHERE 1 = 1");
    if let Some(expr) = match_expr {
        sql.push_str(&format!(" AND \"{c}_fts\" MATCH ?"));
        binds.push(SqlValue::Text(expr.to_string()));
    }
    if !query.include_deleted {
        sql.push_str(&format!(" AND \"{c}\".is_deleted = 0"));
    }
    for clause in &query.clauses {
        push_clause(schema, &mut sql, binds, clause)?;
    }
    Ok(sql)
}

fn push_clause(
    schema: &CollectionSchema,
    sql: &mut String,
    binds: &mut Vec<SqlValue>,
    clause: &Clause,
) -> StoreResult<()> {
    let c = &schema.collection;
    if clause.field == FIELD_ID {
        match &clause.selector {
            Selector::Eq(value) => {
                sql.push_str(&format!(" AND \"{c}\".id = ?"));
                binds.push(bind_value(value));
            }
            Selector::In(values) if values.is_empty() => sql.push_str(" AND 1 = 0"),
            Selector::In(values) => {
                sql.push_str(&format!(" AND \"{c}\".id IN ({})", placeholders(values.len())));
                binds.extend(values.iter().map(bind_value));
            }
        }
        return Ok(());
    }

    let field = schema
        .field(&clause.field)
        .ok_or_else(|| StoreError::UnknownField {
            collection: c.clone(),
            field: clause.field.clone(),
        })?;
    let path = format!("$.{}", field.name);

    if field.is_array() {
        match &clause.selector {
            Selector::Eq(value) => {
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM json_each(\"{c}\".data, '{path}') \
                     WHERE json_each.value = ?)"
                ));
                binds.push(bind_value(value));
            }
            Selector::In(values) if values.is_empty() => sql.push_str(" AND 1 = 0"),
            Selector::In(values) => {
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM json_each(\"{c}\".data, '{path}') \
                     WHERE json_each.value IN ({}))",
                    placeholders(values.len())
                ));
                binds.extend(values.iter().map(bind_value));
            }
        }
    } else {
        match &clause.selector {
            Selector::Eq(Value::Null) => {
                sql.push_str(&format!(" AND json_extract(\"{c}\".data, '{path}') IS NULL"));
            }
            Selector::Eq(value) => {
                sql.push_str(&format!(" AND json_extract(\"{c}\".data, '{path}') = ?"));
                binds.push(bind_value(value));
            }
            Selector::In(values) if values.is_empty() => sql.push_str(" AND 1 = 0"),
            Selector::In(values) => {
                sql.push_str(&format!(
                    " AND json_extract(\"{c}\".data, '{path}') IN ({})",
                    placeholders(values.len())
                ));
                binds.extend(values.iter().map(bind_value));
            }
        }
    }
    Ok(())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn order_clause(c: &str, sort: Sort, with_text: bool) -> String {
    match (sort, with_text) {
        (Sort::Relevance, true) => format!(
            " ORDER BY bm25(\"{c}_fts\"), \"{c}\".created_at DESC, \"{c}\".id ASC"
        ),
        _ => format!(" ORDER BY \"{c}\".created_at DESC, \"{c}\".id ASC"),
    }
}

fn push_paging(sql: &mut String, binds: &mut Vec<SqlValue>, options: &FindOptions) {
    let as_int = |n: u64| SqlValue::Integer(i64::try_from(n).unwrap_or(i64::MAX));
    if let Some(limit) = options.limit {
        sql.push_str(" LIMIT ?");
        binds.push(as_int(limit));
        if let Some(skip) = options.skip.filter(|s| *s > 0) {
            sql.push_str(" OFFSET ?");
            binds.push(as_int(skip));
        }
    } else if let Some(skip) = options.skip.filter(|s| *s > 0) {
        sql.push_str(" LIMIT -1 OFFSET ?");
        binds.push(as_int(skip));
    }
}

fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        // Arrays and objects compare against json_extract's text form.
        other => SqlValue::Text(other.to_string()),
    }
}

// ── Text index feeds ───────────────────────────────────────────────────────

fn fts_content(schema: &CollectionSchema, doc: &JsonObject) -> String {
    let mut parts: Vec<String> = Vec::new();
    for field in schema.searchable_fields() {
        match doc.get(&field.name) {
            Some(Value::String(s)) => parts.push(s.clone()),
            Some(Value::Array(items)) => {
                parts.extend(items.iter().filter_map(|v| v.as_str().map(str::to_string)));
            }
            _ => {}
        }
    }
    parts.join("\n")
}

fn build_match_expression(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let terms: Vec<String> = trimmed.split_whitespace().map(escape_fts_term).collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

// ── Row materialization ────────────────────────────────────────────────────

fn read_doc_row(row: &Row<'_>, with_rank: bool) -> StoreResult<JsonObject> {
    let id: String = row.get(0)?;
    let data: String = row.get(1)?;
    let created_at: i64 = row.get(2)?;
    let updated_at: i64 = row.get(3)?;
    let is_deleted: i64 = row.get(4)?;
    let deleted_at: Option<i64> = row.get(5)?;
    let rank = if with_rank {
        Some(row.get::<_, f64>(6)?)
    } else {
        None
    };
    materialize(id, &data, created_at, updated_at, is_deleted, deleted_at, rank)
}

fn materialize(
    id: String,
    data: &str,
    created_at: i64,
    updated_at: i64,
    is_deleted: i64,
    deleted_at: Option<i64>,
    rank: Option<f64>,
) -> StoreResult<JsonObject> {
    let parsed: Value = serde_json::from_str(data)?;
    let Value::Object(mut doc) = parsed else {
        return Err(StoreError::InvalidDocument(format!(
            "stored document {id} is not a JSON object"
        )));
    };
    doc.insert(FIELD_ID.to_string(), Value::String(id));
    doc.insert(FIELD_CREATED_AT.to_string(), Value::from(created_at));
    doc.insert(FIELD_UPDATED_AT.to_string(), Value::from(updated_at));
    doc.insert(FIELD_IS_DELETED.to_string(), Value::Bool(is_deleted != 0));
    doc.insert(
        FIELD_DELETED_AT.to_string(),
        deleted_at.map_or(Value::Null, Value::from),
    );
    if let Some(rank) = rank {
        // bm25 ranks smaller-is-better; surface the negation so a larger
        // score means a more relevant hit.
        if let Some(score) = serde_json::Number::from_f64(-rank) {
            doc.insert(FIELD_SCORE.to_string(), Value::Number(score));
        }
    }
    Ok(doc)
}

// ── Misc helpers ───────────────────────────────────────────────────────────

fn epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn map_write_err(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate(
                msg.clone()
                    .unwrap_or_else(|| "unique constraint failed".to_string()),
            )
        }
        _ => StoreError::Database(err),
    }
}

fn check_schema(schema: &CollectionSchema) -> StoreResult<()> {
    check_ident(&schema.collection)?;
    for field in &schema.fields {
        check_ident(&field.name)?;
    }
    Ok(())
}

fn check_ident(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid && name.len() <= 64 {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
