// src/catalog.rs
// Per-product catalog built incrementally from the event stream, plus the
// composite time/product/sentiment filter used by the dashboard dropdowns.
//
// Entries are created lazily on the first event for a product id and never
// deleted during a session. Only lightweight tallies are stored, not the
// events themselves, so window eviction and catalog retention stay decoupled.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::event::{ReviewEvent, Sentiment};

/// One `{sentiment, timestamp}` observation for a product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tally {
    pub sentiment: Sentiment,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug)]
struct ProductEntry {
    title: Option<String>,
    tallies: Vec<Tally>,
}

/// Dropdown option for the product filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductOption {
    pub id: String,
    pub label: String,
}

/// A tally joined with its product id, for filtered read-outs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallyRecord {
    #[serde(rename = "asin")]
    pub product_id: String,
    pub sentiment: Sentiment,
    pub observed_at: DateTime<Utc>,
}

/// Enumerated time-range filter, evaluated against `observed_at` relative to
/// the current time at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Last24h,
    Last7d,
    Last30d,
    Last90d,
    All,
}

impl TimeRange {
    /// Parse the wire values used by the dashboard selects.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(TimeRange::Last24h),
            "7d" => Some(TimeRange::Last7d),
            "30d" => Some(TimeRange::Last30d),
            "90d" => Some(TimeRange::Last90d),
            "all" => Some(TimeRange::All),
            _ => None,
        }
    }

    /// Oldest admitted timestamp, or `None` for all-time.
    fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Last24h => Some(now - Duration::hours(24)),
            TimeRange::Last7d => Some(now - Duration::days(7)),
            TimeRange::Last30d => Some(now - Duration::days(30)),
            TimeRange::Last90d => Some(now - Duration::days(90)),
            TimeRange::All => None,
        }
    }
}

/// Product dimension of the filter; `"all"` on the wire becomes `All`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductFilter {
    All,
    Exact(String),
}

/// Sentiment dimension of the filter; `"all"` on the wire becomes `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentFilter {
    All,
    Only(Sentiment),
}

/// Composite filter: logical AND of all three dimensions. Pure read-side,
/// never mutates catalog or feed state.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub time_range: TimeRange,
    pub product_id: ProductFilter,
    pub sentiment: SentimentFilter,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            time_range: TimeRange::All,
            product_id: ProductFilter::All,
            sentiment: SentimentFilter::All,
        }
    }
}

impl FilterCriteria {
    fn matches(
        &self,
        product_id: &str,
        sentiment: Sentiment,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(cutoff) = self.time_range.cutoff(now) {
            if observed_at < cutoff {
                return false;
            }
        }
        if let ProductFilter::Exact(wanted) = &self.product_id {
            if wanted != product_id {
                return false;
            }
        }
        if let SentimentFilter::Only(wanted) = self.sentiment {
            if wanted != sentiment {
                return false;
            }
        }
        true
    }

    pub fn matches_event(&self, event: &ReviewEvent, now: DateTime<Utc>) -> bool {
        self.matches(&event.product_id, event.sentiment, event.observed_at, now)
    }

    pub fn matches_tally(&self, product_id: &str, tally: &Tally, now: DateTime<Utc>) -> bool {
        self.matches(product_id, tally.sentiment, tally.observed_at, now)
    }
}

/// Thread-safe catalog/filter index.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    inner: Mutex<HashMap<String, ProductEntry>>,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update the entry for `event.product_id`, appending one tally.
    /// The title sticks from the first event that carried one.
    pub fn record_event(&self, event: &ReviewEvent) {
        let mut inner = self.inner.lock().expect("catalog mutex poisoned");
        let entry = inner
            .entry(event.product_id.clone())
            .or_insert_with(|| ProductEntry {
                title: None,
                tallies: Vec::new(),
            });
        if entry.title.is_none() && !event.title.is_empty() {
            entry.title = Some(event.title.clone());
        }
        entry.tallies.push(Tally {
            sentiment: event.sentiment,
            observed_at: event.observed_at,
        });
    }

    /// All known products as dropdown options, sorted case-insensitively by
    /// label (with a case-sensitive tie-break for stability).
    pub fn list_products(&self) -> Vec<ProductOption> {
        let inner = self.inner.lock().expect("catalog mutex poisoned");
        let mut options: Vec<ProductOption> = inner
            .iter()
            .map(|(id, entry)| {
                let label = match &entry.title {
                    Some(title) => format!("{id}: {title}"),
                    None => id.clone(),
                };
                ProductOption {
                    id: id.clone(),
                    label,
                }
            })
            .collect();
        options.sort_by(|a, b| {
            a.label
                .to_lowercase()
                .cmp(&b.label.to_lowercase())
                .then_with(|| a.label.cmp(&b.label))
        });
        options
    }

    /// Tallies passing `criteria`, evaluated at `now`. Ordered by product id
    /// and, within a product, by arrival.
    pub fn filtered_tallies(&self, criteria: &FilterCriteria, now: DateTime<Utc>) -> Vec<TallyRecord> {
        let inner = self.inner.lock().expect("catalog mutex poisoned");
        let mut ids: Vec<&String> = inner.keys().collect();
        ids.sort();
        let mut out = Vec::new();
        for id in ids {
            let entry = &inner[id];
            for tally in &entry.tallies {
                if criteria.matches_tally(id, tally, now) {
                    out.push(TallyRecord {
                        product_id: id.clone(),
                        sentiment: tally.sentiment,
                        observed_at: tally.observed_at,
                    });
                }
            }
        }
        out
    }

    /// Number of distinct products seen so far.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("catalog mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(id: &str, title: &str, sentiment: Sentiment, at: &str) -> ReviewEvent {
        ReviewEvent {
            product_id: id.to_string(),
            sentiment,
            title: title.to_string(),
            observed_at: DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
            raw: json!({}),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn one_entry_per_product_with_sticky_title() {
        let catalog = CatalogIndex::new();
        catalog.record_event(&event("B001", "First", Sentiment::Positive, "2024-05-01T10:00:00Z"));
        catalog.record_event(&event("B001", "Second", Sentiment::Negative, "2024-05-01T11:00:00Z"));
        assert_eq!(catalog.len(), 1);
        let products = catalog.list_products();
        assert_eq!(products[0].label, "B001: First");
    }

    #[test]
    fn products_sorted_case_insensitively_by_label() {
        let catalog = CatalogIndex::new();
        catalog.record_event(&event("B010", "Zeta", Sentiment::Neutral, "2024-05-01T10:00:00Z"));
        catalog.record_event(&event("B002", "Alpha", Sentiment::Neutral, "2024-05-01T10:00:00Z"));
        catalog.record_event(&event("a001", "widget", Sentiment::Neutral, "2024-05-01T10:00:00Z"));
        let products = catalog.list_products();
        let labels: Vec<&str> = products.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["a001: widget", "B002: Alpha", "B010: Zeta"]);
    }

    #[test]
    fn time_range_filter_uses_query_time_cutoff() {
        let criteria = FilterCriteria {
            time_range: TimeRange::Last24h,
            ..FilterCriteria::default()
        };
        let recent = Tally {
            sentiment: Sentiment::Positive,
            observed_at: now() - Duration::hours(2),
        };
        let stale = Tally {
            sentiment: Sentiment::Positive,
            observed_at: now() - Duration::days(3),
        };
        assert!(criteria.matches_tally("B001", &recent, now()));
        assert!(!criteria.matches_tally("B001", &stale, now()));
    }

    #[test]
    fn composite_filter_is_logical_and() {
        let catalog = CatalogIndex::new();
        catalog.record_event(&event("B001", "A", Sentiment::Positive, "2024-05-01T10:00:00Z"));
        catalog.record_event(&event("B001", "A", Sentiment::Negative, "2024-05-01T10:00:00Z"));
        catalog.record_event(&event("B002", "B", Sentiment::Positive, "2024-05-01T10:00:00Z"));
        catalog.record_event(&event("B002", "B", Sentiment::Positive, "2024-01-01T10:00:00Z"));

        let criteria = FilterCriteria {
            time_range: TimeRange::Last7d,
            product_id: ProductFilter::Exact("B002".to_string()),
            sentiment: SentimentFilter::Only(Sentiment::Positive),
        };
        let hits = catalog.filtered_tallies(&criteria, now());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product_id, "B002");
    }

    #[test]
    fn all_wildcards_match_everything() {
        let criteria = FilterCriteria::default();
        let ev = event("B001", "A", Sentiment::Negative, "2020-01-01T00:00:00Z");
        assert!(criteria.matches_event(&ev, now()));
    }

    #[test]
    fn filtering_is_idempotent_and_read_only() {
        let catalog = CatalogIndex::new();
        catalog.record_event(&event("B001", "A", Sentiment::Positive, "2024-05-01T10:00:00Z"));
        let criteria = FilterCriteria::default();
        let at = now();
        let first = catalog.filtered_tallies(&criteria, at);
        let second = catalog.filtered_tallies(&criteria, at);
        assert_eq!(first, second);
        assert_eq!(catalog.len(), 1);
    }
}
