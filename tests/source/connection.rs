//! Session Tests
//!
//! Tests for the connection lifecycle:
//! - basic and cookie authentication against a server with users
//! - failures surface as `MissingConnection`
//! - disconnect / reconnect

use crate::common::*;
use std::sync::Arc;

fn secured() -> Arc<MemoryCouch> {
    Arc::new(MemoryCouch::new().with_database(DB).with_user("admin", "s3cret"))
}

fn config(auth: &str, password: &str) -> SourceConfig {
    let mut config = SourceConfig::for_database(DB);
    config.auth = auth.to_string();
    config.login = Some("admin".to_string());
    config.password = Some(password.to_string());
    config
}

#[test]
fn basic_credentials_ride_on_every_request() {
    let t = TestSource::over(secured(), config("basic", "s3cret"));
    let (id, _) = t.create_post(json!({"title": "x"}));
    assert!(t.couch.document(DB, &id).is_some());
    assert!(t
        .couch
        .requests()
        .iter()
        .all(|r| r.endpoint.credentials.is_some()));
}

#[test]
fn cookie_session_rides_on_every_request() {
    let t = TestSource::over(secured(), config("cookie", "s3cret"));
    let (id, _) = t.create_post(json!({"title": "x"}));
    assert!(t.couch.document(DB, &id).is_some());

    let requests = t.couch.requests();
    assert!(requests.iter().all(|r| r.endpoint.credentials.is_none()));
    assert!(requests
        .iter()
        .all(|r| r.header("Cookie").is_some_and(|c| c.starts_with("AuthSession="))));
}

#[test]
fn wrong_password_fails_to_open() {
    for auth in ["basic", "cookie"] {
        let err = CouchSource::open(config(auth, "wrong"), secured())
            .err()
            .unwrap();
        assert!(err.is_connection_error(), "{}: {:?}", auth, err);
    }
}

#[test]
fn unreachable_server_fails_to_open() {
    let couch = secured();
    couch.set_unreachable(true);
    let err = CouchSource::open(config("basic", "s3cret"), couch)
        .err()
        .unwrap();
    assert_eq!(
        err,
        SourceError::MissingConnection {
            reason: "network error: connection refused".to_string()
        }
    );
}

#[test]
fn unauthenticated_source_is_refused_by_secured_server() {
    let mut config = SourceConfig::for_database(DB);
    config.auth = "none".to_string();
    let t = TestSource::over(secured(), config);
    let err = t
        .source
        .read(&post(), &QueryDescriptor::all())
        .unwrap_err();
    assert!(matches!(err, SourceError::Fatal { .. }));
}

#[test]
fn lazy_connect_happens_on_first_operation() {
    let mut config = config("basic", "s3cret");
    config.auto_connect = false;
    let t = TestSource::over(secured(), config);
    assert!(!t.source.is_connected());

    t.source.read(&post(), &QueryDescriptor::all()).unwrap();
    assert!(t.source.is_connected());
    let paths: Vec<String> = t.couch.requests().iter().map(|r| r.path.clone()).collect();
    assert_eq!(paths, vec!["/".to_string(), "/blog/_all_docs".to_string()]);
}

#[test]
fn disconnect_then_operation_reconnects() {
    let t = TestSource::over(secured(), config("cookie", "s3cret"));
    assert!(t.source.disconnect());
    assert!(!t.source.is_connected());
    assert!(t.source.disconnect());

    t.create_post(json!({}));
    assert!(t.source.is_connected());
    assert_eq!(t.couch.count_method(Method::Post), 1);
}

#[test]
fn reconnect_switches_credentials() {
    let couch = secured();
    couch.add_user("editor", "pen");
    let t = TestSource::over(couch, config("basic", "s3cret"));

    let patch = ConfigPatch {
        login: Some("editor".to_string()),
        password: Some("pen".to_string()),
        ..ConfigPatch::default()
    };
    assert!(t.source.reconnect(patch).unwrap());
    t.create_post(json!({}));

    let last = t.couch.requests().pop().unwrap();
    assert_eq!(last.endpoint.credentials.unwrap().user, "editor");
    assert_eq!(t.source.config().login.as_deref(), Some("editor"));
}

#[test]
fn reconnect_with_bad_credentials_leaves_source_disconnected() {
    let t = TestSource::over(secured(), config("basic", "s3cret"));
    let patch = ConfigPatch {
        password: Some("nope".to_string()),
        ..ConfigPatch::default()
    };
    assert!(t.source.reconnect(patch).unwrap_err().is_connection_error());
    assert!(!t.source.is_connected());
}
