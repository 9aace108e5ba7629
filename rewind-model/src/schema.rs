use serde::{Deserialize, Serialize};

/// Describes a collection's domain fields for filtering, search and indexing.
///
/// The store derives its physical layout from this: a text index over the
/// searchable fields and a partial unique index per unique field. The query
/// layer rejects filters on fields that are not declared here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub collection: String,
    pub fields: Vec<FieldSpec>,
}

impl CollectionSchema {
    pub fn new(collection: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            collection: collection.into(),
            fields,
        }
    }

    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The declared fields feeding the collection's text index.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.searchable)
    }

    /// The declared fields enforced unique among live documents.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Whether any field feeds the text index.
    #[must_use]
    pub fn has_searchable_fields(&self) -> bool {
        self.fields.iter().any(|f| f.searchable)
    }
}

/// A declared domain field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Top-level field name as it appears in the stored JSON (e.g. "gameName").
    pub name: String,
    pub kind: FieldKind,
    pub searchable: bool,
    /// Enforced unique among non-deleted documents via a partial index.
    #[serde(default)]
    pub unique: bool,
    /// Target collection. Only meaningful when FieldKind is Relation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_target: Option<String>,
}

impl FieldSpec {
    fn simple(name: &str, kind: FieldKind, searchable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            searchable,
            unique: false,
            relation_target: None,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: &str, searchable: bool) -> Self {
        Self::simple(name, FieldKind::Text, searchable)
    }

    /// Shorthand for an array of opaque string values. Equality filters on
    /// these fields become membership tests.
    pub fn tags(name: &str) -> Self {
        Self::simple(name, FieldKind::Tags, false)
    }

    /// Shorthand for a numeric field.
    pub fn number(name: &str) -> Self {
        Self::simple(name, FieldKind::Number, false)
    }

    /// Shorthand for a boolean field.
    pub fn bool(name: &str) -> Self {
        Self::simple(name, FieldKind::Bool, false)
    }

    /// Shorthand for a relation field holding the id (or ids) of documents
    /// in `target`.
    pub fn relation(name: &str, target: &str) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Relation,
            searchable: false,
            unique: false,
            relation_target: Some(target.into()),
        }
    }

    /// Shorthand for an opaque JSON blob field.
    pub fn json(name: &str) -> Self {
        Self::simple(name, FieldKind::Json, false)
    }

    /// Marks the field unique among non-deleted documents.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Whether the field holds an array value.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, FieldKind::Tags)
    }
}

/// The data type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Tags,
    Number,
    Bool,
    Relation,
    Json,
}
