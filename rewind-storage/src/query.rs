//! Store-native query primitives.
//!
//! A [`Query`] names declared fields and exact values only; the store turns it
//! into SQL with bound parameters. Anything richer (operator validation,
//! sentinel handling, array rewriting) happens one layer up, before a query is
//! built.

use serde_json::Value;

/// A filter over one collection.
///
/// Unless [`Query::include_deleted`] is set, every query implicitly excludes
/// soft-deleted documents.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub clauses: Vec<Clause>,
    pub include_deleted: bool,
    /// Free-text clause matched against the collection's text index.
    pub text: Option<String>,
}

impl Query {
    /// A query matching every live document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A query matching one document by id.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().eq(rewind_model::FIELD_ID, Value::String(id.into()))
    }

    /// Adds an equality clause.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            selector: Selector::Eq(value),
        });
        self
    }

    /// Adds a membership clause.
    #[must_use]
    pub fn within(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            selector: Selector::In(values),
        });
        self
    }

    /// Includes soft-deleted documents in the result.
    #[must_use]
    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Adds a free-text clause.
    #[must_use]
    pub fn matching(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// One field constraint.
#[derive(Debug, Clone)]
pub struct Clause {
    pub field: String,
    pub selector: Selector,
}

/// How a clause matches its field.
#[derive(Debug, Clone)]
pub enum Selector {
    /// Exact value. On array fields this matches documents whose array
    /// contains the value.
    Eq(Value),
    /// Any of the given values. On array fields this matches documents whose
    /// array contains at least one of them.
    In(Vec<Value>),
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sort {
    /// Newest first; ties broken by id for a stable order.
    #[default]
    CreatedDesc,
    /// Best text match first. Falls back to [`Sort::CreatedDesc`] when the
    /// query carries no text clause.
    Relevance,
}

/// Pagination and ordering for multi-document fetches.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Sort,
}

impl FindOptions {
    /// Options for one page of results.
    #[must_use]
    pub fn page(skip: u64, limit: u64, sort: Sort) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
            sort,
        }
    }
}
