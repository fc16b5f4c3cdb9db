//! Record lifecycle tests
//!
//! Tests for create/read/update/delete through the `DocumentSource` contract:
//! - Round trip of a created record
//! - Kind tag visible only at the storage boundary
//! - The worked create → probe → update exchange

use crate::common::*;
use settee::HttpResponse;

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn created_record_reads_back_with_id_and_revision() {
    let t = TestSource::new();
    let input = json!({"title": "Hello", "tags": ["a", "b"], "views": 3});
    let mut record = Record::new();

    t.source
        .create(&post(), &mut record, Some(fields(input.clone())))
        .unwrap();
    let id = record.id.clone().unwrap();

    let outcome = t
        .source
        .read(&post(), &QueryDescriptor::by_id("Post._id", id.as_str()))
        .unwrap();
    let docs = documents(&outcome);
    assert_eq!(docs.len(), 1);

    let mut read = fields(docs[0].clone());
    assert_eq!(read.remove("_id"), Some(json!(id)));
    let rev = read.remove("_rev").unwrap();
    assert!(!rev.as_str().unwrap().is_empty());
    read.remove("type");
    assert_eq!(Value::Object(read), input);
}

#[test]
fn kind_tag_is_stored_on_the_document() {
    let t = TestSource::new();
    let (id, _) = t.create_post(json!({"title": "x"}));
    let stored = t.couch.document(DB, &id).unwrap();
    assert_eq!(stored["type"], "post");
}

#[test]
fn custom_kind_field_is_used() {
    let mut config = SourceConfig::for_database(DB);
    config.kind_field = "model".to_string();
    let t = TestSource::with_config(config);
    let (id, _) = t.create_post(json!({}));
    let stored = t.couch.document(DB, &id).unwrap();
    assert_eq!(stored["model"], "post");
    assert!(stored.get("type").is_none());
}

#[test]
fn create_uses_record_data_when_no_fields_given() {
    let t = TestSource::new();
    let mut record = Record::from_fields(&post(), fields(json!({"_id": "given", "title": "t"})));
    let written = t.source.create(&post(), &mut record, None).unwrap().ok().unwrap();
    assert_eq!(written["_id"], "given");
    assert_eq!(t.couch.document(DB, "given").unwrap()["title"], "t");
}

#[test]
fn entity_database_override_is_honored() {
    let t = TestSource::new();
    t.couch.create_database("archive");
    let archived = EntityModel::new("Post").with_database("archive");
    let mut record = Record::with_id("old");

    t.source
        .create(&archived, &mut record, Some(FieldMap::new()))
        .unwrap();
    assert!(t.couch.document("archive", "old").is_some());
    assert!(t.couch.document(DB, "old").is_none());
}

#[test]
fn full_lifecycle_through_trait_object() {
    let t = TestSource::new();
    let source: &dyn DocumentSource = &t.source;
    let mut record = Record::new();

    assert!(source
        .create(&post(), &mut record, Some(fields(json!({"n": 1}))))
        .unwrap()
        .is_done());
    assert!(source
        .update(&post(), &mut record, fields(json!({"n": 2})))
        .unwrap()
        .is_done());
    assert!(source.delete(&post(), &record, &FieldMap::new()).unwrap());

    let id = record.id.unwrap();
    assert!(t.couch.document(DB, &id).is_none());
}

// ============================================================================
// Worked exchange
// ============================================================================

fn ok_json(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(status, "OK")
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string())
}

#[test]
fn create_probe_update_exchange() {
    let t = TestSource::new();
    t.couch
        .script(ok_json(201, json!({"ok": true, "id": "abc", "rev": "1-x"})));
    t.couch
        .script(HttpResponse::new(200, "OK").with_header("ETag", "\"1-x\""));
    t.couch
        .script(ok_json(200, json!({"_id": "abc", "_rev": "1-x", "name": "a", "type": "post"})));
    t.couch
        .script(ok_json(201, json!({"ok": true, "id": "abc", "rev": "2-y"})));

    let mut record = Record::new();
    let written = t
        .source
        .create(&post(), &mut record, Some(fields(json!({"name": "a"}))))
        .unwrap()
        .ok()
        .unwrap();
    assert_eq!(record.id.as_deref(), Some("abc"));
    assert_eq!(written["_rev"], "1-x");

    let rev = t.source.get_revision(&post(), &record, Some("abc")).unwrap();
    assert_eq!(rev, Some(Revision::new("1-x")));

    let mut target = Record::with_id("abc");
    let updated = t
        .source
        .update(&post(), &mut target, fields(json!({"name": "b"})))
        .unwrap()
        .ok()
        .unwrap();
    assert_eq!(updated, Revision::new("2-y"));
    assert_ne!(updated, Revision::new("1-x"));

    assert_eq!(
        t.methods(),
        vec![Method::Put, Method::Head, Method::Get, Method::Put]
    );

    let requests = t.couch.requests();
    let put: Value = serde_json::from_slice(requests[3].body.as_deref().unwrap()).unwrap();
    assert_eq!(put["name"], "b");
    assert_eq!(put["_rev"], "1-x");
    assert_eq!(put["type"], "post");
    assert_eq!(target.data["_rev"], "2-y");
}
