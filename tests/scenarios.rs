// tests/scenarios.rs
//
// End-to-end scenarios for the normalize → feed/catalog path, driven
// synchronously through the public library surface.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use review_sentiment_feed::{
    normalize, CatalogIndex, FeedAggregator, FilterCriteria, Sentiment,
};

fn arrival() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn new_review_with_numeric_code_updates_counters() {
    let feed = FeedAggregator::new();

    let msg = json!({"type": "new_review", "asin": "B001", "sentiment": 2});
    let ev = normalize(&msg, arrival()).expect("accepted");
    assert_eq!(ev.product_id, "B001");
    assert_eq!(ev.sentiment, Sentiment::Positive);
    assert_eq!(ev.title, "Product B001");

    feed.record_event(Arc::new(ev));
    let counts = feed.counts();
    assert_eq!(
        (counts.positive, counts.neutral, counts.negative),
        (1, 0, 0)
    );
}

#[test]
fn new_sentiment_with_label_and_summary() {
    let msg = json!({
        "type": "new_sentiment",
        "asin": "B002",
        "sentiment_label": "Negative",
        "summary": "Widget"
    });
    let ev = normalize(&msg, arrival()).expect("accepted");
    assert_eq!(ev.product_id, "B002");
    assert_eq!(ev.sentiment, Sentiment::Negative);
    assert_eq!(ev.title, "Widget");
}

#[test]
fn missing_product_identifier_changes_no_state() {
    let feed = FeedAggregator::new();
    let catalog = CatalogIndex::new();

    let msg = json!({"type": "new_review", "sentiment": 2, "title": "Orphan"});
    assert!(normalize(&msg, arrival()).is_none());

    assert!(feed.window().is_empty());
    assert_eq!(feed.counts().total(), 0);
    assert!(catalog.is_empty());
}

#[test]
fn hundred_and_first_event_evicts_only_the_oldest() {
    let feed = FeedAggregator::new();
    for i in 0..101 {
        let msg = json!({
            "type": "new_review",
            "asin": format!("B{i:03}"),
            "sentiment": 1
        });
        let ev = normalize(&msg, arrival()).expect("accepted");
        feed.record_event(Arc::new(ev));
    }

    let window = feed.window();
    assert_eq!(window.len(), 100);
    assert_eq!(window[0].product_id, "B100");
    assert!(window.iter().all(|ev| ev.product_id != "B000"));
    assert_eq!(feed.counts().total(), 101);
}

#[test]
fn product_listing_orders_by_label() {
    let catalog = CatalogIndex::new();
    for (asin, title) in [("B010", "Zeta"), ("B002", "Alpha")] {
        let msg = json!({"type": "new_review", "asin": asin, "title": title, "sentiment": 2});
        catalog.record_event(&normalize(&msg, arrival()).expect("accepted"));
    }
    let labels: Vec<String> = catalog
        .list_products()
        .into_iter()
        .map(|p| p.label)
        .collect();
    assert_eq!(labels, vec!["B002: Alpha", "B010: Zeta"]);
}

#[test]
fn pause_window_discards_exactly_the_paused_events() {
    let feed = FeedAggregator::new();
    let record = |feed: &FeedAggregator, asin: &str| {
        let msg = json!({"type": "new_review", "asin": asin, "sentiment": 2});
        feed.record_event(Arc::new(normalize(&msg, arrival()).expect("accepted")));
    };

    record(&feed, "before");
    feed.pause();
    record(&feed, "during");
    feed.resume();
    record(&feed, "after");

    let window = feed.window();
    let ids: Vec<&str> = window.iter().map(|e| e.product_id.as_str()).collect();
    assert_eq!(ids, vec!["after", "before"]);
    assert_eq!(feed.counts().total(), 2);
}

#[test]
fn filter_results_are_stable_for_unchanged_state() {
    let catalog = CatalogIndex::new();
    for i in 0..5 {
        let msg = json!({"type": "new_review", "asin": format!("B{i}"), "sentiment": i % 3});
        catalog.record_event(&normalize(&msg, arrival()).expect("accepted"));
    }
    let criteria = FilterCriteria::default();
    let at = arrival();
    assert_eq!(
        catalog.filtered_tallies(&criteria, at),
        catalog.filtered_tallies(&criteria, at)
    );
}
