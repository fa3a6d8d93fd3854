// src/normalize.rs
// Turns raw inbound messages into canonical `ReviewEvent`s.
//
// The event source sends two tagged shapes (`new_review`, `new_sentiment`)
// whose payload may sit under a `data` envelope or inline on the message, with
// sentiment encoded as a numeric code, a lowercase label string, or a separate
// human-readable `sentiment_label`. Everything else is filtered, not an error.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::event::{ReviewEvent, Sentiment};

/// Message type tags accepted as review/sentiment events.
const ACCEPTED_TYPES: &[&str] = &["new_review", "new_sentiment"];

type ClassifierRule = fn(&Map<String, Value>) -> Option<Sentiment>;

/// Ordered sentiment classifier rules; first recognized signal wins.
/// Order is load-bearing: numeric codes shadow string labels, which shadow
/// the human-readable label field.
const CLASSIFIER_RULES: &[(&str, ClassifierRule)] = &[
    ("numeric_code", classify_numeric_code),
    ("canonical_string", classify_canonical_string),
    ("label_field", classify_label_field),
];

/// Numeric code rule: `2` is positive, `0` is negative, any other number is
/// neutral by contract (unknown codes are not an error).
fn classify_numeric_code(payload: &Map<String, Value>) -> Option<Sentiment> {
    let v = payload.get("sentiment")?;
    if !v.is_number() {
        return None;
    }
    Some(match v.as_f64() {
        Some(n) if n == 2.0 => Sentiment::Positive,
        Some(n) if n == 0.0 => Sentiment::Negative,
        _ => Sentiment::Neutral,
    })
}

/// String rule: `sentiment` already carries a canonical lowercase label.
fn classify_canonical_string(payload: &Map<String, Value>) -> Option<Sentiment> {
    Sentiment::parse(payload.get("sentiment")?.as_str()?)
}

/// Label rule: `sentiment_label` matched case-sensitively.
fn classify_label_field(payload: &Map<String, Value>) -> Option<Sentiment> {
    match payload.get("sentiment_label")?.as_str()? {
        "Positive" => Some(Sentiment::Positive),
        "Negative" => Some(Sentiment::Negative),
        _ => None,
    }
}

fn classify_sentiment(payload: &Map<String, Value>) -> Sentiment {
    for (name, rule) in CLASSIFIER_RULES {
        if let Some(sentiment) = rule(payload) {
            debug!(rule = name, sentiment = sentiment.as_str(), "sentiment classified");
            return sentiment;
        }
    }
    // A signal was present but matched no known encoding: neutral, with a
    // diagnostic. No signal at all is silently neutral.
    if payload.contains_key("sentiment") || payload.contains_key("sentiment_label") {
        warn!(
            sentiment = ?payload.get("sentiment"),
            sentiment_label = ?payload.get("sentiment_label"),
            "unrecognized sentiment signal, defaulting to neutral"
        );
        counter!("feed_unrecognized_sentiment_total").increment(1);
    }
    Sentiment::Neutral
}

/// Timestamp fields accepted as RFC 3339 strings or unix epoch seconds/millis.
/// Malformed values fall through to the next source in the priority chain.
fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    if let Some(s) = v.as_str() {
        return DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
    }
    if let Some(n) = v.as_i64() {
        // Epoch seconds fit in 11 digits until the year 5138; larger is millis.
        return if n.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        };
    }
    None
}

fn observed_at(payload: &Map<String, Value>, received_at: DateTime<Utc>) -> DateTime<Utc> {
    payload
        .get("processed_at")
        .and_then(parse_timestamp)
        .or_else(|| payload.get("prediction_time").and_then(parse_timestamp))
        .unwrap_or(received_at)
}

fn non_empty_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Normalize one raw inbound message into a `ReviewEvent`.
///
/// Pure given its inputs: `received_at` is the ingestion-time-of-arrival
/// fallback for `observed_at`, fixed by the caller so repeated calls on the
/// same message are deterministic. Returns `None` for anything that is not an
/// accepted review/sentiment message or that lacks a product identifier; the
/// caller logs and skips, this never faults.
pub fn normalize(raw: &Value, received_at: DateTime<Utc>) -> Option<ReviewEvent> {
    let Some(msg) = raw.as_object() else {
        debug!("dropping non-object message");
        return None;
    };

    let msg_type = msg.get("type").and_then(Value::as_str);
    match msg_type {
        Some(t) if ACCEPTED_TYPES.contains(&t) => {}
        _ => {
            debug!(msg_type = ?msg_type, "dropping message with unrecognized type");
            return None;
        }
    }

    // Payload may be wrapped in a `data` envelope or carried inline.
    let payload = msg
        .get("data")
        .and_then(Value::as_object)
        .unwrap_or(msg);

    let Some(product_id) = non_empty_str(payload, "asin") else {
        warn!("rejecting event without product identifier");
        return None;
    };

    let title = non_empty_str(payload, "title")
        .or_else(|| non_empty_str(payload, "summary"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Product {product_id}"));

    Some(ReviewEvent {
        product_id: product_id.to_string(),
        sentiment: classify_sentiment(payload),
        title,
        observed_at: observed_at(payload, received_at),
        raw: raw.clone(),
    })
}
