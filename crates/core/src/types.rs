//! Core types for Settee
//!
//! This module defines the record-layer vocabulary:
//! - EntityModel: what the adapter needs to know about a record type
//! - Record: the caller's mutable handle (current id + field map)
//! - Revision: the store's compare-and-swap token
//! - ResultRow / RowBody: one normalized result row
//! - Outcome: success, or a classified non-fatal failure

use crate::classify::ErrorSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Open field map of a schemaless document
pub type FieldMap = serde_json::Map<String, Value>;

/// Generate a fresh document identifier.
///
/// UUID v4 rendered as 32 lowercase hex digits, the shape CouchDB uses for
/// server-assigned ids.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Opaque revision token (`"<generation>-<digest>"` in CouchDB)
///
/// Only meaningful relative to the document id it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    /// Wrap a raw revision string
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// Parse the value of an `ETag` header, stripping surrounding quotes.
    ///
    /// Returns None when nothing is left after trimming.
    pub fn from_etag(etag: &str) -> Option<Self> {
        let trimmed = etag.trim().trim_matches('"');
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Raw revision string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading generation number, if the token has the `N-digest` shape
    pub fn generation(&self) -> Option<u64> {
        self.0.split_once('-').and_then(|(n, _)| n.parse().ok())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptor of a record type as seen by the adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityModel {
    /// Entity kind (e.g. `Post`); lowercased for the kind tag and design name
    pub name: String,
    /// Tag under which result rows are returned
    pub alias: String,
    /// Identifier field name
    pub primary_key: String,
    /// Revision field name
    pub revision_key: String,
    /// Field used to name the default pagination view
    pub display_field: String,
    /// Database override for this entity
    pub database: Option<String>,
}

impl EntityModel {
    /// Create a model with CouchDB defaults (`_id`, `_rev`, `title`)
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            primary_key: "_id".to_string(),
            revision_key: "_rev".to_string(),
            display_field: "title".to_string(),
            database: None,
        }
    }

    /// Override the result alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Override the display field
    pub fn with_display_field(mut self, field: impl Into<String>) -> Self {
        self.display_field = field.into();
        self
    }

    /// Store this entity in a database other than the configured one
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Value of the entity-kind tag
    pub fn kind(&self) -> String {
        self.name.to_lowercase()
    }

    /// Look up a condition or field by bare or alias-qualified name
    /// (`_id` or `Post._id`).
    pub fn lookup<'a>(&self, map: &'a FieldMap, field: &str) -> Option<&'a Value> {
        map.get(field)
            .or_else(|| map.get(&format!("{}.{}", self.alias, field)))
    }

    /// Identifier named by a condition/field map, if any
    pub fn id_in(&self, map: &FieldMap) -> Option<String> {
        self.lookup(map, &self.primary_key).and_then(non_empty_text)
    }

    /// Revision named by a condition/field map, if any
    pub fn revision_in(&self, map: &FieldMap) -> Option<Revision> {
        self.lookup(map, &self.revision_key)
            .and_then(non_empty_text)
            .map(Revision)
    }
}

/// Text form of a scalar key value; None for null, empty strings and
/// structured values.
pub(crate) fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Caller-held record state
///
/// `id` is the record's current identifier (set after a successful write);
/// `data` is the last field map written or read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Current identifier
    pub id: Option<String>,
    /// Current field map
    pub data: FieldMap,
}

impl Record {
    /// Empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Record addressing an existing identifier
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            data: FieldMap::new(),
        }
    }

    /// Record holding a field map (identifier taken from `model.primary_key`)
    pub fn from_fields(model: &EntityModel, data: FieldMap) -> Self {
        Self {
            id: model.id_in(&data),
            data,
        }
    }

    /// Current identifier; an empty one counts as unset
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Revision carried in the current field map
    pub fn revision(&self, model: &EntityModel) -> Option<Revision> {
        model.revision_in(&self.data)
    }
}

/// Body of a normalized result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowBody {
    /// A document (or view value)
    Document(Value),
    /// Result of a count query
    Count(u64),
}

/// One normalized result row, tagged with the entity alias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Entity alias
    pub alias: String,
    /// Row body
    pub body: RowBody,
}

impl ResultRow {
    /// Document row
    pub fn document(alias: &str, value: Value) -> Self {
        Self {
            alias: alias.to_string(),
            body: RowBody::Document(value),
        }
    }

    /// Count row
    pub fn count(alias: &str, count: u64) -> Self {
        Self {
            alias: alias.to_string(),
            body: RowBody::Count(count),
        }
    }

    /// Document value, if this is a document row
    pub fn as_document(&self) -> Option<&Value> {
        match &self.body {
            RowBody::Document(v) => Some(v),
            RowBody::Count(_) => None,
        }
    }

    /// Count value, if this is a count row
    pub fn as_count(&self) -> Option<u64> {
        match &self.body {
            RowBody::Count(n) => Some(*n),
            RowBody::Document(_) => None,
        }
    }
}

/// Result of an operation that may be refused by the store without that
/// being an outage
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Operation succeeded
    Done(T),
    /// Store refused or could not find; the classified errors say why
    Rejected(ErrorSet),
}

impl<T> Outcome<T> {
    /// True on success
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    /// Success value, discarding the errors
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Done(v) => Some(v),
            Outcome::Rejected(_) => None,
        }
    }

    /// Classified errors of a rejection
    pub fn errors(&self) -> Option<&ErrorSet> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Rejected(e) => Some(e),
        }
    }

    /// Map the success value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(v) => Outcome::Done(f(v)),
            Outcome::Rejected(e) => Outcome::Rejected(e),
        }
    }
}

impl Outcome<Vec<ResultRow>> {
    /// Rows of a successful read; empty for a rejection
    pub fn rows(&self) -> &[ResultRow] {
        match self {
            Outcome::Done(rows) => rows,
            Outcome::Rejected(_) => &[],
        }
    }
}
