//! Query formatting: generic list requests into store-native queries.
//!
//! Filters are validated against the collection schema before anything
//! reaches the store. Unknown fields are errors, operator objects are limited
//! to an explicit `$in` allow-list, and equality filters on array fields are
//! rewritten into membership tests. The `"nil"` sentinel marks an intentional
//! no-match probe: the field is dropped from the filter and the whole query
//! short-circuits to an empty page.

use crate::error::FilterError;
use rewind_model::{CollectionSchema, FieldSpec, JsonObject, FIELD_ID};
use rewind_storage::{Query, Sort};
use rewind_types::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, NIL_SENTINEL};
use serde_json::Value;

const OP_IN: &str = "$in";

/// A generic list request: pagination, field filters, optional free text.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub queries: JsonObject,
    pub search: Option<String>,
}

impl ListRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.queries.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }
}

/// A list request translated into store primitives.
#[derive(Debug, Clone)]
pub(crate) struct FormattedList {
    pub page: u64,
    pub page_size: u64,
    pub skip: u64,
    /// Validated filters without the text clause; totals count against this.
    pub base: Query,
    /// Free-text clause, appended only after the total is taken.
    pub text: Option<String>,
    /// A sentinel value was bound; the page payload must stay empty.
    pub short_circuit: bool,
    pub sort: Sort,
}

pub(crate) fn format_list(
    schema: &CollectionSchema,
    request: &ListRequest,
) -> Result<FormattedList, FilterError> {
    let (base, short_circuit) = build_filter_query(schema, &request.queries)?;
    let page = request.page.unwrap_or(DEFAULT_PAGE).max(1);
    let page_size = request.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let text = request
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let sort = if text.is_some() {
        Sort::Relevance
    } else {
        Sort::CreatedDesc
    };
    Ok(FormattedList {
        page,
        page_size,
        skip: (page - 1) * page_size,
        base,
        text,
        short_circuit,
        sort,
    })
}

/// Validates a filter map against the schema and builds the store query.
/// The boolean reports whether any field carried the `"nil"` sentinel.
pub(crate) fn build_filter_query(
    schema: &CollectionSchema,
    filters: &JsonObject,
) -> Result<(Query, bool), FilterError> {
    let mut query = Query::all();
    let mut sentinel = false;

    for (key, value) in filters {
        let field = declared_or_id(schema, key)?;
        match value {
            Value::Object(map) => {
                query = apply_operator(query, key, map)?;
            }
            Value::String(s) if s == NIL_SENTINEL => {
                sentinel = true;
            }
            Value::Array(items) => match field {
                Some(f) if f.is_array() => {
                    query = query.within(key.clone(), items.clone());
                }
                None => {
                    query = query.within(key.clone(), items.clone());
                }
                Some(_) => return Err(FilterError::UnsupportedValue(key.clone())),
            },
            other => match field {
                Some(f) if f.is_array() => {
                    // Scalars against array fields become membership tests.
                    query = query.within(key.clone(), vec![other.clone()]);
                }
                _ => {
                    query = query.eq(key.clone(), other.clone());
                }
            },
        }
    }

    Ok((query, sentinel))
}

fn apply_operator(
    query: Query,
    key: &str,
    map: &serde_json::Map<String, Value>,
) -> Result<Query, FilterError> {
    if map.len() == 1 {
        if let Some(value) = map.get(OP_IN) {
            let Value::Array(items) = value else {
                return Err(FilterError::UnsupportedValue(key.to_string()));
            };
            return Ok(query.within(key.to_string(), items.clone()));
        }
    }
    match map.keys().next() {
        Some(operator) => Err(FilterError::UnsupportedOperator {
            field: key.to_string(),
            operator: operator.clone(),
        }),
        None => Err(FilterError::UnsupportedValue(key.to_string())),
    }
}

/// Resolves a filter key: `None` stands for the id field, which every
/// collection has without declaring it.
fn declared_or_id<'a>(
    schema: &'a CollectionSchema,
    key: &str,
) -> Result<Option<&'a FieldSpec>, FilterError> {
    if key == FIELD_ID {
        return Ok(None);
    }
    schema
        .field(key)
        .map(Some)
        .ok_or_else(|| FilterError::UnknownField(key.to_string()))
}
