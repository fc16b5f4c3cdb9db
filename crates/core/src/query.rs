//! Abstract query descriptor
//!
//! The record layer speaks a SQL-shaped vocabulary (conditions, order,
//! limit/offset, count). The engine's translator maps it onto what the store
//! actually offers: direct key lookup, `_all_docs` listing and named views.

use crate::types::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which fields the caller wants back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSelection {
    /// Whole documents
    #[default]
    All,
    /// Only the number of matching documents
    Count,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending keys
    #[default]
    Asc,
    /// Descending keys
    Desc,
}

impl Direction {
    /// Parse `asc` / `desc` (case-insensitive); anything else is ascending
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }
}

/// Single ordering clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field name, optionally alias-qualified (`Post.title`)
    pub field: String,
    /// Direction
    pub direction: Direction,
}

impl OrderBy {
    /// Ascending order on `field`
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    /// Descending order on `field`
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Field name without any alias qualifier
    pub fn bare_field(&self) -> &str {
        self.field.rsplit('.').next().unwrap_or(&self.field)
    }
}

/// Abstract query handed to the translator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Conditions; only an exact identifier match is interpreted
    pub conditions: FieldMap,
    /// Requested fields
    pub fields: FieldSelection,
    /// Ordering, at most one clause
    pub order: Option<OrderBy>,
    /// Maximum number of rows
    pub limit: Option<u64>,
    /// Cursor: the last-seen key of the previous page
    pub offset: Option<Value>,
    /// View name (used together with `design`)
    pub view: Option<String>,
    /// Design document name (used together with `view`)
    pub design: Option<String>,
    /// Store-specific parameters, merged over computed ones
    pub params: FieldMap,
}

impl QueryDescriptor {
    /// Query over all documents
    pub fn all() -> Self {
        Self::default()
    }

    /// Query for one document by identifier
    pub fn by_id(primary_key: &str, id: impl Into<String>) -> Self {
        let mut query = Self::default();
        query
            .conditions
            .insert(primary_key.to_string(), Value::String(id.into()));
        query
    }

    /// Query a named view
    pub fn view(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design: Some(design.into()),
            view: Some(view.into()),
            ..Self::default()
        }
    }

    /// Ask for a count instead of documents
    pub fn count(mut self) -> Self {
        self.fields = FieldSelection::Count;
        self
    }

    /// Limit the number of rows
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume after the given key
    pub fn after(mut self, cursor: impl Into<Value>) -> Self {
        self.offset = Some(cursor.into());
        self
    }

    /// Set the ordering clause
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Add a passthrough parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// True if only a count is requested
    pub fn is_count(&self) -> bool {
        self.fields == FieldSelection::Count
    }

    /// Cursor value if it is meaningful (not null, empty, zero or false)
    pub fn cursor(&self) -> Option<&Value> {
        self.offset.as_ref().filter(|v| match v {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty() && s != "0",
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        })
    }
}
