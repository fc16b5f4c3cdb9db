//! Listing and Count Tests
//!
//! Tests for `_all_docs` listings:
//! - Cursor paging (startkey + skip=1) visits every document exactly once
//! - Count queries against listings and direct fetches

use crate::common::*;
use proptest::prelude::*;

fn seed(t: &TestSource, n: usize) -> Vec<String> {
    let mut ids: Vec<String> = (0..n).map(|i| format!("doc{:03}", i)).collect();
    for id in &ids {
        t.couch.insert(DB, id, json!({"title": id}));
    }
    // Listings with a limit walk the key space descending
    ids.sort();
    ids.reverse();
    ids
}

fn walk(t: &TestSource, limit: u64) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut query = QueryDescriptor::all().limit(limit);
        if let Some(last) = &cursor {
            query = query.after(last.as_str());
        }
        let outcome = t.source.read(&post(), &query).unwrap();
        let page: Vec<String> = documents(&outcome)
            .iter()
            .map(|d| d["_id"].as_str().unwrap().to_string())
            .collect();
        if page.is_empty() {
            break;
        }
        let short = (page.len() as u64) < limit;
        cursor = page.last().cloned();
        pages.push(page);
        if short {
            break;
        }
    }
    pages
}

// ============================================================================
// Cursor paging
// ============================================================================

#[test]
fn cursor_pages_cover_listing() {
    let t = TestSource::new();
    let ids = seed(&t, 7);
    let pages = walk(&t, 3);
    assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 1]);
    assert_eq!(pages.concat(), ids);
}

#[test]
fn cursor_requests_carry_startkey_and_skip() {
    let t = TestSource::new();
    seed(&t, 4);
    walk(&t, 2);
    let requests = t.couch.requests();
    assert!(requests[0].query.iter().all(|(k, _)| k != "startkey"));
    let second = &requests[1].query;
    assert!(second.contains(&("startkey".to_string(), "\"doc002\"".to_string())));
    assert!(second.contains(&("skip".to_string(), "1".to_string())));
    assert!(second.contains(&("descending".to_string(), "true".to_string())));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn cursor_paging_visits_each_document_once(n in 0usize..30, limit in 1u64..8) {
        let t = TestSource::new();
        let ids = seed(&t, n);
        let pages = walk(&t, limit);

        for page in pages.iter().take(pages.len().saturating_sub(1)) {
            prop_assert_eq!(page.len() as u64, limit);
        }
        if let Some(last) = pages.last() {
            prop_assert!(last.len() as u64 <= limit);
        }
        prop_assert_eq!(pages.concat(), ids);
    }
}

// ============================================================================
// Counts
// ============================================================================

#[test]
fn count_against_listing_is_total_rows() {
    let t = TestSource::new();
    seed(&t, 12);
    let outcome = t
        .source
        .read(&post(), &QueryDescriptor::all().limit(5).count())
        .unwrap();
    assert_eq!(outcome.rows(), &[ResultRow::count("Post", 12)][..]);

    let count_request = t.couch.requests().pop().unwrap();
    assert!(count_request.query.iter().all(|(k, _)| k != "limit"));
}

#[test]
fn count_against_direct_hit_is_one() {
    let t = TestSource::new();
    let (id, _) = t.create_post(json!({}));
    let outcome = t
        .source
        .read(&post(), &QueryDescriptor::by_id("_id", id.as_str()).count())
        .unwrap();
    assert_eq!(outcome.rows(), &[ResultRow::count("Post", 1)][..]);
}

#[test]
fn count_against_direct_miss_is_empty_not_zero() {
    let t = TestSource::new();
    let outcome = t
        .source
        .read(&post(), &QueryDescriptor::by_id("_id", "nobody").count())
        .unwrap();
    assert!(outcome.rows().is_empty());
    assert!(!outcome.is_done());
    assert_eq!(
        t.source
            .count(&post(), &QueryDescriptor::by_id("_id", "nobody"))
            .unwrap(),
        None
    );
}

#[test]
fn count_helper_ignores_ordering() {
    let t = TestSource::new();
    seed(&t, 4);
    let query = QueryDescriptor::all().order_by(OrderBy::desc("Post.title"));
    assert_eq!(t.source.count(&post(), &query).unwrap(), Some(4));
}

#[test]
fn passthrough_params_reach_the_store() {
    let t = TestSource::new();
    seed(&t, 5);
    let query = QueryDescriptor::all()
        .param("startkey", "doc002")
        .param("limit", 2);
    let ids: Vec<String> = documents(&t.source.read(&post(), &query).unwrap())
        .iter()
        .map(|d| d["_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["doc002", "doc003"]);
}
