//! In-memory CouchDB
//!
//! Implements the slice of the CouchDB 1.x REST surface the engine uses, with
//! real revision (compare-and-swap) semantics, `_all_docs` paging parameters
//! and map-only views backed by closures. Every request is recorded so tests
//! can assert on the exact traffic an operation produced.

use super::collate::collate;
use crate::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Map function of a view: document in, `(key, value)` emissions out
pub type ViewFn = Arc<dyn Fn(&Value) -> Vec<(Value, Value)> + Send + Sync>;

const SESSION_COOKIE: &str = "AuthSession";

struct StoredDoc {
    generation: u64,
    rev: String,
    body: Map<String, Value>,
    deleted: bool,
}

impl StoredDoc {
    fn to_json(&self, id: &str) -> Value {
        let mut doc = Map::new();
        doc.insert("_id".to_string(), Value::String(id.to_string()));
        doc.insert("_rev".to_string(), Value::String(self.rev.clone()));
        for (k, v) in &self.body {
            doc.insert(k.clone(), v.clone());
        }
        Value::Object(doc)
    }
}

struct IndexRow {
    id: String,
    key: Value,
    value: Value,
    doc: Value,
}

#[derive(Default)]
struct CouchState {
    databases: BTreeMap<String, BTreeMap<String, StoredDoc>>,
    views: HashMap<(String, String, String), ViewFn>,
    users: BTreeMap<String, String>,
    sessions: BTreeSet<String>,
    requests: Vec<HttpRequest>,
    scripted: VecDeque<Result<HttpResponse, TransportError>>,
    unreachable: bool,
    rev_seq: u64,
    resets: usize,
}

impl CouchState {
    fn next_rev(&mut self, generation: u64) -> String {
        self.rev_seq += 1;
        format!("{}-{:032x}", generation, self.rev_seq)
    }
}

/// In-memory CouchDB server
#[derive(Default)]
pub struct MemoryCouch {
    state: Mutex<CouchState>,
}

impl MemoryCouch {
    /// Server with no databases and no users (no authentication required)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`create_database`](Self::create_database)
    pub fn with_database(self, name: &str) -> Self {
        self.create_database(name);
        self
    }

    /// Builder form of [`add_user`](Self::add_user)
    pub fn with_user(self, name: &str, password: &str) -> Self {
        self.add_user(name, password);
        self
    }

    /// Create an empty database (no-op if it exists)
    pub fn create_database(&self, name: &str) {
        self.state
            .lock()
            .databases
            .entry(name.to_string())
            .or_default();
    }

    /// Register a user; once any user exists, every request must authenticate
    pub fn add_user(&self, name: &str, password: &str) {
        self.state
            .lock()
            .users
            .insert(name.to_string(), password.to_string());
    }

    /// Define a map-only view `/{db}/_design/{design}/_view/{view}`
    pub fn define_view(
        &self,
        db: &str,
        design: &str,
        view: &str,
        map: impl Fn(&Value) -> Vec<(Value, Value)> + Send + Sync + 'static,
    ) {
        self.state.lock().views.insert(
            (db.to_string(), design.to_string(), view.to_string()),
            Arc::new(map),
        );
    }

    /// Store a document directly, bypassing revision checks; returns its revision
    pub fn insert(&self, db: &str, id: &str, body: Value) -> String {
        let mut state = self.state.lock();
        let generation = state
            .databases
            .get(db)
            .and_then(|docs| docs.get(id))
            .map(|d| d.generation + 1)
            .unwrap_or(1);
        let rev = state.next_rev(generation);
        let mut fields = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.remove("_id");
        fields.remove("_rev");
        state.databases.entry(db.to_string()).or_default().insert(
            id.to_string(),
            StoredDoc {
                generation,
                rev: rev.clone(),
                body: fields,
                deleted: false,
            },
        );
        rev
    }

    /// Stored document (with `_id` and `_rev`), if live
    pub fn document(&self, db: &str, id: &str) -> Option<Value> {
        let state = self.state.lock();
        state
            .databases
            .get(db)
            .and_then(|docs| docs.get(id))
            .filter(|d| !d.deleted)
            .map(|d| d.to_json(id))
    }

    /// Current revision of a live document
    pub fn revision(&self, db: &str, id: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .databases
            .get(db)
            .and_then(|docs| docs.get(id))
            .filter(|d| !d.deleted)
            .map(|d| d.rev.clone())
    }

    /// Number of live documents in a database
    pub fn doc_count(&self, db: &str) -> usize {
        let state = self.state.lock();
        state
            .databases
            .get(db)
            .map(|docs| docs.values().filter(|d| !d.deleted).count())
            .unwrap_or(0)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Forget recorded requests
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Number of requests received with the given method
    pub fn count_method(&self, method: Method) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// Answer the next request with `response` instead of handling it
    pub fn script(&self, response: HttpResponse) {
        self.state.lock().scripted.push_back(Ok(response));
    }

    /// Fail the next request with a transport error
    pub fn script_error(&self, error: TransportError) {
        self.state.lock().scripted.push_back(Err(error));
    }

    /// Refuse every request with a network error while set
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Number of times [`Transport::reset`] was called
    pub fn reset_count(&self) -> usize {
        self.state.lock().resets
    }
}

impl Transport for MemoryCouch {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        if state.unreachable {
            return Err(TransportError::Network("connection refused".to_string()));
        }
        if let Some(scripted) = state.scripted.pop_front() {
            return scripted;
        }
        Ok(handle(&mut state, request))
    }

    fn reset(&self) {
        self.state.lock().resets += 1;
    }
}

// ============================================================================
// Responses
// ============================================================================

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Object Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        _ => "Unknown",
    }
}

fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse::new(status, reason_phrase(status))
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string())
}

fn error_response(status: u16, error: &str, reason: &str) -> HttpResponse {
    json_response(status, &json!({"error": error, "reason": reason}))
}

fn not_found(reason: &str) -> HttpResponse {
    error_response(404, "not_found", reason)
}

fn conflict() -> HttpResponse {
    error_response(409, "conflict", "Document update conflict.")
}

fn with_etag(response: HttpResponse, rev: &str) -> HttpResponse {
    response.with_header("ETag", format!("\"{}\"", rev))
}

// ============================================================================
// Dispatch
// ============================================================================

fn param<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.query
        .iter()
        .rev()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

fn session_token(req: &HttpRequest) -> Option<String> {
    let cookie = req.header("Cookie")?;
    cookie.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='))
            .map(|token| token.to_string())
    })
}

fn credentials_valid(state: &CouchState, req: &HttpRequest) -> Option<bool> {
    req.endpoint
        .credentials
        .as_ref()
        .map(|c| state.users.get(&c.user) == Some(&c.password))
}

fn authorized(state: &CouchState, req: &HttpRequest) -> bool {
    if state.users.is_empty() {
        return true;
    }
    if credentials_valid(state, req) == Some(true) {
        return true;
    }
    session_token(req).is_some_and(|t| state.sessions.contains(&t))
}

fn handle(state: &mut CouchState, req: &HttpRequest) -> HttpResponse {
    let segments: Vec<String> = req
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect();

    if segments.is_empty() {
        if credentials_valid(state, req) == Some(false) {
            return error_response(401, "unauthorized", "Name or password is incorrect.");
        }
        return json_response(200, &json!({"couchdb": "Welcome", "version": "1.6.1"}));
    }

    if segments[0] == "_session" {
        return match req.method {
            Method::Post => session_login(state, req),
            _ => error_response(405, "method_not_allowed", "Only POST allowed"),
        };
    }

    if !authorized(state, req) {
        return error_response(401, "unauthorized", "You are not authorized to access this db.");
    }

    if segments[0] == "_all_dbs" {
        let names: Vec<Value> = state
            .databases
            .keys()
            .map(|k| Value::String(k.clone()))
            .collect();
        return json_response(200, &Value::Array(names));
    }

    let db = segments[0].clone();
    if !state.databases.contains_key(&db) {
        return not_found("no_db_file");
    }

    let rest: Vec<&str> = segments[1..].iter().map(|s| s.as_str()).collect();
    match rest.as_slice() {
        [] => {
            let count = state.databases[&db].values().filter(|d| !d.deleted).count();
            json_response(200, &json!({"db_name": db, "doc_count": count}))
        }
        ["_all_docs"] => all_docs(state, &db, req),
        ["_design", design, "_view", view] => view_query(state, &db, design, view, req),
        ["_design", design] => document(state, &db, &format!("_design/{}", design), req),
        [id] => document(state, &db, id, req),
        _ => not_found("missing"),
    }
}

fn session_login(state: &mut CouchState, req: &HttpRequest) -> HttpResponse {
    let body = req
        .body
        .as_deref()
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    let mut name = String::new();
    let mut password = String::new();
    for pair in body.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            let v = decode_segment(v);
            match k {
                "name" => name = v,
                "password" => password = v,
                _ => {}
            }
        }
    }

    if state.users.get(&name) != Some(&password) {
        return error_response(401, "unauthorized", "Name or password is incorrect.");
    }

    state.rev_seq += 1;
    let token = format!("{:x}{:x}", name.len(), state.rev_seq);
    state.sessions.insert(token.clone());
    json_response(200, &json!({"ok": true, "name": name, "roles": []})).with_header(
        "Set-Cookie",
        format!("{}={}; Version=1; Path=/; HttpOnly", SESSION_COOKIE, token),
    )
}

// ============================================================================
// Documents
// ============================================================================

fn document(state: &mut CouchState, db: &str, id: &str, req: &HttpRequest) -> HttpResponse {
    match req.method {
        Method::Get | Method::Head => {
            let found = state.databases[db].get(id);
            let response = match found {
                Some(doc) if !doc.deleted => {
                    with_etag(json_response(200, &doc.to_json(id)), &doc.rev)
                }
                Some(_) => not_found("deleted"),
                None => not_found("missing"),
            };
            if req.method == Method::Head {
                HttpResponse {
                    body: Vec::new(),
                    ..response
                }
            } else {
                response
            }
        }
        Method::Put => put_document(state, db, id, req),
        Method::Delete => delete_document(state, db, id, req),
        Method::Post => error_response(405, "method_not_allowed", "Only GET,HEAD,PUT,DELETE allowed"),
    }
}

fn put_document(state: &mut CouchState, db: &str, id: &str, req: &HttpRequest) -> HttpResponse {
    let parsed: Result<Value, _> = serde_json::from_slice(req.body.as_deref().unwrap_or(b""));
    let mut fields = match parsed {
        Ok(Value::Object(map)) => map,
        Ok(_) => return error_response(400, "bad_request", "Document must be a JSON object"),
        Err(_) => return error_response(400, "bad_request", "invalid UTF-8 JSON"),
    };

    let supplied = fields
        .get("_rev")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .or_else(|| param(req, "rev").map(|s| s.to_string()));
    fields.remove("_id");
    fields.remove("_rev");

    let generation = match state.databases[db].get(id) {
        Some(doc) if !doc.deleted => {
            if supplied.as_deref() != Some(doc.rev.as_str()) {
                return conflict();
            }
            doc.generation + 1
        }
        Some(doc) => {
            if supplied.is_some() && supplied.as_deref() != Some(doc.rev.as_str()) {
                return conflict();
            }
            doc.generation + 1
        }
        None => {
            if supplied.is_some() {
                return conflict();
            }
            1
        }
    };

    let rev = state.next_rev(generation);
    if let Some(docs) = state.databases.get_mut(db) {
        docs.insert(
            id.to_string(),
            StoredDoc {
                generation,
                rev: rev.clone(),
                body: fields,
                deleted: false,
            },
        );
    }
    with_etag(
        json_response(201, &json!({"ok": true, "id": id, "rev": rev})),
        &rev,
    )
}

fn delete_document(state: &mut CouchState, db: &str, id: &str, req: &HttpRequest) -> HttpResponse {
    let generation = match state.databases[db].get(id) {
        Some(doc) if !doc.deleted => {
            if param(req, "rev") != Some(doc.rev.as_str()) {
                return conflict();
            }
            doc.generation + 1
        }
        Some(_) => return not_found("deleted"),
        None => return not_found("missing"),
    };

    let rev = state.next_rev(generation);
    if let Some(doc) = state.databases.get_mut(db).and_then(|docs| docs.get_mut(id)) {
        doc.generation = generation;
        doc.rev = rev.clone();
        doc.body.clear();
        doc.deleted = true;
    }
    json_response(200, &json!({"ok": true, "id": id, "rev": rev}))
}

// ============================================================================
// Listings
// ============================================================================

fn all_docs(state: &CouchState, db: &str, req: &HttpRequest) -> HttpResponse {
    let rows = state.databases[db]
        .iter()
        .filter(|(_, d)| !d.deleted)
        .map(|(id, d)| IndexRow {
            id: id.clone(),
            key: Value::String(id.clone()),
            value: json!({"rev": d.rev}),
            doc: d.to_json(id),
        })
        .collect();
    page_rows(rows, req)
}

fn view_query(
    state: &CouchState,
    db: &str,
    design: &str,
    view: &str,
    req: &HttpRequest,
) -> HttpResponse {
    let key = (db.to_string(), design.to_string(), view.to_string());
    let Some(map) = state.views.get(&key) else {
        let design_exists = state
            .views
            .keys()
            .any(|(d, g, _)| d == db && g == design);
        return if design_exists {
            not_found("missing_named_view")
        } else {
            not_found("missing")
        };
    };

    let mut rows = Vec::new();
    for (id, stored) in state.databases[db].iter().filter(|(_, d)| !d.deleted) {
        let doc = stored.to_json(id);
        for (key, value) in (**map)(&doc) {
            rows.push(IndexRow {
                id: id.clone(),
                key,
                value,
                doc: doc.clone(),
            });
        }
    }
    page_rows(rows, req)
}

fn page_rows(mut rows: Vec<IndexRow>, req: &HttpRequest) -> HttpResponse {
    let total = rows.len();
    rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));

    let descending = param(req, "descending") == Some("true");
    if descending {
        rows.reverse();
    }

    if let Some(raw) = param(req, "startkey") {
        let Ok(start) = serde_json::from_str::<Value>(raw) else {
            return error_response(400, "bad_request", "invalid startkey");
        };
        rows.retain(|r| {
            let ord = collate(&r.key, &start);
            if descending {
                ord != Ordering::Greater
            } else {
                ord != Ordering::Less
            }
        });
    }

    let skip = match param(req, "skip").map(str::parse::<usize>) {
        None => 0,
        Some(Ok(n)) => n,
        Some(Err(_)) => return error_response(400, "query_parse_error", "Invalid value for skip"),
    };
    let limit = match param(req, "limit").map(str::parse::<usize>) {
        None => usize::MAX,
        Some(Ok(n)) => n,
        Some(Err(_)) => return error_response(400, "query_parse_error", "Invalid value for limit"),
    };
    let include_docs = param(req, "include_docs") == Some("true");

    let offset = (total - rows.len() + skip).min(total);
    let out: Vec<Value> = rows
        .into_iter()
        .skip(skip)
        .take(limit)
        .map(|r| {
            let mut row = json!({"id": r.id, "key": r.key, "value": r.value});
            if include_docs {
                row["doc"] = r.doc;
            }
            row
        })
        .collect();

    json_response(
        200,
        &json!({"total_rows": total, "offset": offset, "rows": out}),
    )
}
