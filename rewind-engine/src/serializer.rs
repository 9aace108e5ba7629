//! Response shaping: fields excluded from everything a service returns.

use rewind_model::JsonObject;

/// An exclusion list applied to every document a service hands back,
/// including populated sub-documents.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    excluded: Vec<String>,
}

impl Serializer {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// A serializer that hides nothing.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// The excluded field names.
    #[must_use]
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    /// Strips the excluded fields from a document.
    #[must_use]
    pub fn prune(&self, mut doc: JsonObject) -> JsonObject {
        for field in &self.excluded {
            doc.remove(field);
        }
        doc
    }

    /// Strips the excluded fields plus per-call extras.
    #[must_use]
    pub fn prune_with(&self, doc: JsonObject, extra: &[&str]) -> JsonObject {
        let mut doc = self.prune(doc);
        for field in extra {
            doc.remove(*field);
        }
        doc
    }
}
