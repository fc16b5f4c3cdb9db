//! Shared test utilities for all integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::{Arc, Once};

pub use serde_json::{json, Value};
pub use settee::testing::MemoryCouch;
pub use settee::{
    ConfigPatch, CouchSource, DocumentSource, EntityModel, FieldMap, Method, OrderBy, Outcome,
    QueryDescriptor, Record, ResultRow, Revision, SourceConfig, SourceError,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (visible with `--nocapture`).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .try_init();
    });
}

/// Database every fixture uses
pub const DB: &str = "blog";

/// Field map from a JSON object literal
pub fn fields(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// The entity most tests work with
pub fn post() -> EntityModel {
    EntityModel::new("Post")
}

// ============================================================================
// TestSource - CouchSource over an in-memory store
// ============================================================================

/// A source wired to an in-memory CouchDB holding the `blog` database.
pub struct TestSource {
    pub couch: Arc<MemoryCouch>,
    pub source: CouchSource,
}

impl TestSource {
    /// Default configuration, no authentication required by the server.
    pub fn new() -> Self {
        Self::with_config(SourceConfig::for_database(DB))
    }

    /// Custom configuration against a fresh server.
    pub fn with_config(config: SourceConfig) -> Self {
        init_tracing();
        let couch = Arc::new(MemoryCouch::new().with_database(DB));
        Self::over(couch, config)
    }

    /// Custom configuration against an existing server.
    pub fn over(couch: Arc<MemoryCouch>, config: SourceConfig) -> Self {
        init_tracing();
        let source = CouchSource::open(config, couch.clone()).expect("open source");
        couch.clear_requests();
        TestSource { couch, source }
    }

    /// Create a `Post` with the given fields, returning its id and revision.
    pub fn create_post(&self, data: Value) -> (String, Revision) {
        let mut record = Record::new();
        let written = self
            .source
            .create(&post(), &mut record, Some(fields(data)))
            .expect("create")
            .ok()
            .expect("create accepted");
        let rev = written["_rev"].as_str().expect("revision").to_string();
        (record.id.expect("id"), Revision::new(rev))
    }

    /// Methods of the requests recorded since the last clear.
    pub fn methods(&self) -> Vec<Method> {
        self.couch.requests().iter().map(|r| r.method).collect()
    }
}

impl Default for TestSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Document bodies of a successful read
pub fn documents(outcome: &Outcome<Vec<ResultRow>>) -> Vec<Value> {
    outcome
        .rows()
        .iter()
        .filter_map(|row| row.as_document().cloned())
        .collect()
}
