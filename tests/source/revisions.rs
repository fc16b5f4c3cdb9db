//! Revision Tests
//!
//! Tests for optimistic concurrency on document revisions:
//! - Successive writes yield distinct revisions that the HEAD probe reports
//! - Stale revisions are rejected; omitted revisions are resolved
//! - Delete never fires without a revision
//! - Racing writers: exactly one wins per revision

use crate::common::*;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use std::thread;

// ============================================================================
// Distinctness
// ============================================================================

#[test]
fn successive_writes_yield_distinct_revisions() {
    let t = TestSource::new();
    let mut record = Record::new();
    let first = t
        .source
        .create(&post(), &mut record, Some(fields(json!({"v": 1}))))
        .unwrap()
        .ok()
        .unwrap();
    let first = Revision::new(first["_rev"].as_str().unwrap());
    assert_eq!(
        t.source.get_revision(&post(), &record, None).unwrap(),
        Some(first.clone())
    );

    let second = t
        .source
        .update(&post(), &mut record, fields(json!({"v": 2})))
        .unwrap()
        .ok()
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(
        t.source.get_revision(&post(), &record, None).unwrap(),
        Some(second.clone())
    );

    let third = t
        .source
        .update(&post(), &mut record, fields(json!({"v": 3})))
        .unwrap()
        .ok()
        .unwrap();
    assert_ne!(second, third);
    assert_eq!(third.generation(), Some(3));
}

// ============================================================================
// Compare-and-swap
// ============================================================================

#[test]
fn update_with_stale_revision_fails() {
    let t = TestSource::new();
    let (id, first) = t.create_post(json!({"v": 1}));

    let mut record = Record::with_id(id.as_str());
    t.source
        .update(&post(), &mut record, fields(json!({"v": 2})))
        .unwrap()
        .ok()
        .unwrap();

    let mut stale = Record::with_id(id.as_str());
    let outcome = t
        .source
        .update(
            &post(),
            &mut stale,
            fields(json!({"v": 3, "_rev": first.as_str()})),
        )
        .unwrap();
    assert!(outcome.errors().unwrap().is_conflict());
    assert_eq!(t.couch.document(DB, &id).unwrap()["v"], 2);
}

#[test]
fn update_without_revision_resolves_current_one() {
    let t = TestSource::new();
    let (id, _) = t.create_post(json!({"v": 1, "keep": true}));
    t.couch.clear_requests();

    let mut record = Record::with_id(id.as_str());
    let outcome = t
        .source
        .update(&post(), &mut record, fields(json!({"v": 2})))
        .unwrap();
    assert!(outcome.is_done());
    assert_eq!(t.methods(), vec![Method::Get, Method::Put]);

    let stored = t.couch.document(DB, &id).unwrap();
    assert_eq!(stored["v"], 2);
    assert_eq!(stored["keep"], true);
}

#[test]
fn update_identifier_can_come_from_fields() {
    let t = TestSource::new();
    let (id, _) = t.create_post(json!({"v": 1}));
    let mut record = Record::new();
    let outcome = t
        .source
        .update(&post(), &mut record, fields(json!({"_id": id.clone(), "v": 9})))
        .unwrap();
    assert!(outcome.is_done());
    assert_eq!(record.id, Some(id));
}

// ============================================================================
// Delete
// ============================================================================

#[test]
fn delete_without_resolvable_revision_sends_no_delete() {
    let t = TestSource::new();
    let record = Record::with_id("never-written");
    assert!(!t
        .source
        .delete(&post(), &record, &FieldMap::new())
        .unwrap());
    assert_eq!(t.couch.count_method(Method::Delete), 0);
}

#[test]
fn delete_with_current_revision_removes_document() {
    let t = TestSource::new();
    let (id, rev) = t.create_post(json!({}));
    let conditions = fields(json!({"_id": id.clone(), "_rev": rev.as_str()}));
    assert!(t.source.delete(&post(), &Record::new(), &conditions).unwrap());
    assert!(t.couch.document(DB, &id).is_none());

    // A second delete finds nothing to resolve
    assert!(!t
        .source
        .delete(&post(), &Record::with_id(id.as_str()), &FieldMap::new())
        .unwrap());
}

#[test]
fn empty_identifier_never_reaches_the_database_endpoint() {
    let t = TestSource::new();
    t.create_post(json!({"keep": true}));
    t.couch.clear_requests();

    let mut blank = Record::with_id("");
    blank.data.insert("_rev".to_string(), json!("1-x"));
    assert!(!t.source.delete(&post(), &blank, &FieldMap::new()).unwrap());
    assert_eq!(t.source.get_revision(&post(), &blank, Some("")).unwrap(), None);
    assert!(t
        .source
        .update(&post(), &mut blank.clone(), fields(json!({"v": 1})))
        .is_err());

    let mut fresh = Record::with_id("");
    assert!(t
        .source
        .create(&post(), &mut fresh, Some(fields(json!({"v": 2}))))
        .unwrap()
        .is_done());

    let database_root = format!("/{}/", DB);
    assert!(t.couch.requests().iter().all(|r| r.path != database_root));
    assert_eq!(t.methods(), vec![Method::Put]);
    assert_eq!(t.couch.doc_count(DB), 2);
}

// ============================================================================
// Racing writers
// ============================================================================

#[test]
fn racing_updates_at_one_revision_have_one_winner() {
    let t = Arc::new(TestSource::new());
    let (id, rev) = t.create_post(json!({"v": 0}));
    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));
    let winners = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..writers)
        .map(|n| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            let id = id.clone();
            let rev = rev.clone();
            thread::spawn(move || {
                let mut record = Record::with_id(id.as_str());
                barrier.wait();
                let outcome = t
                    .source
                    .update(
                        &post(),
                        &mut record,
                        fields(json!({"v": n, "_rev": rev.as_str()})),
                    )
                    .unwrap();
                if outcome.is_done() {
                    winners.lock().push(n);
                } else {
                    assert!(outcome.errors().unwrap().is_conflict());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let winners = winners.lock();
    assert_eq!(winners.len(), 1);
    assert_eq!(t.couch.document(DB, &id).unwrap()["v"], winners[0]);
}
