// src/event.rs
// Canonical record produced by normalization and shared by the feed and catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-way sentiment classification, serialized in the lowercase wire form
/// the dashboard consumes (`"positive" | "neutral" | "negative"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Parse the canonical lowercase label. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

/// A normalized review-sentiment event. Immutable once constructed; the feed
/// window and catalog reference it, they never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewEvent {
    /// Product identifier (`asin` on the wire). Always non-empty.
    #[serde(rename = "asin")]
    pub product_id: String,
    pub sentiment: Sentiment,
    /// Display name; synthesized as `"Product {asin}"` when the source sent none.
    pub title: String,
    pub observed_at: DateTime<Utc>,
    /// Original payload, retained for debugging only. Aggregation never reads it.
    pub raw: serde_json::Value,
}

/// Running per-sentiment counters. Monotonic for the session: they count every
/// accepted event ever seen, independent of window eviction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

impl SentimentCounts {
    pub fn increment(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.positive + self.neutral + self.negative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_parse_is_exact_lowercase() {
        assert_eq!(Sentiment::parse("positive"), Some(Sentiment::Positive));
        assert_eq!(Sentiment::parse("negative"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse("Positive"), None);
        assert_eq!(Sentiment::parse("meh"), None);
    }

    #[test]
    fn counts_total_sums_all_buckets() {
        let mut c = SentimentCounts::default();
        c.increment(Sentiment::Positive);
        c.increment(Sentiment::Positive);
        c.increment(Sentiment::Negative);
        assert_eq!(c.total(), 3);
        assert_eq!(c.positive, 2);
        assert_eq!(c.neutral, 0);
    }
}
