//! Query translation
//!
//! Maps a [`QueryDescriptor`] onto the three read shapes the store offers,
//! in priority order:
//!
//! 1. view and design both named → `/{db}/_design/{design}/_view/{view}`
//! 2. exact identifier condition → `/{db}/{id}` (direct fetch, no listing)
//! 3. otherwise → `/{db}/_all_docs`
//!
//! Listing pagination is cursor based: `startkey` is the last key of the
//! previous page and `skip=1` drops the boundary row the store would repeat.
//! Passthrough parameters are merged last so they can override any computed
//! default.

use serde_json::Value;
use settee_core::{EntityModel, QueryDescriptor, ResultRow};
use std::collections::BTreeMap;

/// Parameters whose values the store parses as JSON
const JSON_PARAMS: &[&str] = &["key", "keys", "startkey", "endkey", "start_key", "end_key"];

/// Which read shape a query maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Precomputed view
    View {
        /// Design document
        design: String,
        /// View name
        view: String,
    },
    /// Direct document fetch
    Document {
        /// Document identifier
        id: String,
    },
    /// Bulk key listing
    AllDocs,
}

/// Concrete GET request produced by [`translate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    /// Read shape
    pub target: Target,
    /// Escaped path, starting with `/`
    pub path: String,
    /// Final query parameters
    pub params: BTreeMap<String, String>,
    /// Only a count is wanted
    pub count: bool,
}

impl StoreRequest {
    /// True when rows should be unwrapped to their `doc` member
    pub fn include_docs(&self) -> bool {
        self.params.get("include_docs").map(String::as_str) == Some("true")
    }

    /// Parameters as ordered pairs
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Render a passthrough value as a query parameter
pub fn param_text(name: &str, value: &Value) -> String {
    if JSON_PARAMS.contains(&name) {
        return value.to_string();
    }
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Translate an abstract query into one store request against `database`
/// (already path-escaped).
pub fn translate(query: &QueryDescriptor, model: &EntityModel, database: &str) -> StoreRequest {
    let mut params = BTreeMap::new();

    let (target, path) = match (&query.view, &query.design) {
        (Some(view), Some(design)) => (
            Target::View {
                design: design.clone(),
                view: view.clone(),
            },
            format!(
                "/{}/_design/{}/_view/{}",
                database,
                urlencoding::encode(design),
                urlencoding::encode(view)
            ),
        ),
        _ => match model.id_in(&query.conditions) {
            Some(id) => {
                let path = format!("/{}/{}", database, urlencoding::encode(&id));
                (Target::Document { id }, path)
            }
            None => {
                if let Some(limit) = query.limit.filter(|l| *l > 0) {
                    params.insert("limit".to_string(), limit.to_string());
                    params.insert("descending".to_string(), "true".to_string());
                    if let Some(cursor) = query.cursor() {
                        params.insert("startkey".to_string(), cursor.to_string());
                        params.insert("skip".to_string(), "1".to_string());
                    }
                }
                (Target::AllDocs, format!("/{}/_all_docs", database))
            }
        },
    };

    if !query.is_count() && !matches!(target, Target::Document { .. }) {
        params.insert("include_docs".to_string(), "true".to_string());
    }

    for (name, value) in &query.params {
        params.insert(name.clone(), param_text(name, value));
    }

    if query.is_count() {
        params.remove("limit");
    }

    StoreRequest {
        target,
        path,
        params,
        count: query.is_count(),
    }
}

/// Normalize a successful response body into result rows tagged `alias`.
pub fn shape_response(request: &StoreRequest, body: &Value, alias: &str) -> Vec<ResultRow> {
    let rows = body.get("rows").and_then(Value::as_array);

    match (&request.target, request.count) {
        (Target::Document { .. }, true) => vec![ResultRow::count(alias, 1)],
        (Target::Document { .. }, false) => vec![ResultRow::document(alias, body.clone())],
        (_, true) => {
            let total = body
                .get("total_rows")
                .and_then(Value::as_u64)
                .unwrap_or_else(|| rows.map(|r| r.len() as u64).unwrap_or(0));
            vec![ResultRow::count(alias, total)]
        }
        (_, false) => {
            let member = if request.include_docs() { "doc" } else { "value" };
            rows.map(|rows| {
                rows.iter()
                    .map(|row| {
                        ResultRow::document(alias, row.get(member).cloned().unwrap_or(Value::Null))
                    })
                    .collect()
            })
            .unwrap_or_default()
        }
    }
}
