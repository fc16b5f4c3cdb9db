//! Query Log Tests

use crate::common::*;

#[test]
fn requests_are_logged_with_url_and_body() {
    let t = TestSource::new();
    let (id, _) = t.create_post(json!({"title": "logged"}));
    t.source
        .read(&post(), &QueryDescriptor::all().limit(2))
        .unwrap();

    let report = t.source.drain_log(false, false);
    assert_eq!(report.count, 2);
    assert_eq!(report.entries[0].query, format!("PUT /blog/{}", id));
    assert!(report.entries[0].params.contains("\"title\":\"logged\""));
    assert_eq!(
        report.entries[1].query,
        "GET /blog/_all_docs?descending=true&include_docs=true&limit=2"
    );
    assert_eq!(report.entries[1].params, "");
    assert!(report.entries.iter().all(|e| e.error.is_empty()));
}

#[test]
fn bound_comes_from_configuration() {
    let mut config = SourceConfig::for_database(DB);
    config.query_log_max = 3;
    let t = TestSource::with_config(config);
    for _ in 0..5 {
        t.source.read(&post(), &QueryDescriptor::all()).unwrap();
    }
    let report = t.source.drain_log(true, true);
    assert_eq!(report.entries.len(), 3);
    assert_eq!(report.count, 5);
    assert_eq!(t.source.query_log().max(), 3);
    assert!(t.source.query_log().is_empty());
}

#[test]
fn default_bound_is_two_hundred() {
    let t = TestSource::new();
    assert_eq!(t.source.query_log().max(), 200);
}

#[test]
fn disabled_log_records_nothing() {
    let mut config = SourceConfig::for_database(DB);
    config.log_queries = false;
    let t = TestSource::with_config(config);
    t.create_post(json!({}));
    let report = t.source.drain_log(false, false);
    assert!(report.entries.is_empty());
    assert_eq!(report.count, 0);
}
