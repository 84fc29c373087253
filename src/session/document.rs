use serde_json::Value;

/// The server-assigned metadata attached to a tracked document: `@collection`, `@id`,
/// `@change-vector`, `@last-modified`. Distinct from [`SessionDocument::change_vector`], which is
/// the field the executor actually reads when deciding whether to stamp a write — this struct is
/// the full, caller-observable metadata envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub collection: Option<String>,
    pub id: Option<String>,
    pub change_vector: Option<String>,
    pub last_modified: Option<String>,
}

impl DocumentMetadata {
    /// Parses a document's `"@metadata"` object (as returned by Get Documents) into a
    /// `DocumentMetadata`. Missing or non-string fields are left `None`.
    pub(crate) fn from_metadata_value(value: Option<&Value>) -> Self {
        let field = |key: &str| {
            value
                .and_then(|v| v.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            collection: field("@collection"),
            id: field("@id"),
            change_vector: field("@change-vector"),
            last_modified: field("@last-modified"),
        }
    }
}

/// One document tracked by a [`super::Session`]'s identity map.
#[derive(Debug, Clone)]
pub struct SessionDocument {
    pub key: String,
    pub entity: Value,
    pub change_vector: Option<String>,
    /// The document's current metadata. Mutating `entity` does not touch this until the next
    /// `save_changes` round-trip refreshes it from the server's response.
    pub metadata: DocumentMetadata,
    /// The metadata as last known to the server. `None` means this document was `store`d but
    /// never round-tripped through the server yet.
    pub original_metadata: Option<DocumentMetadata>,
    /// The entity's value as last known to the server (on load, or after a successful put).
    /// `None` means this document was `store`d but never round-tripped through the server yet, so
    /// it is always considered dirty.
    pub original_value: Option<Value>,
}

impl SessionDocument {
    /// Whether this document has changed since it was last known to the server, by deep equality
    /// against `original_value`.
    pub(crate) fn is_dirty(&self) -> bool {
        match &self.original_value {
            Some(original) => original != &self.entity,
            None => true,
        }
    }
}
