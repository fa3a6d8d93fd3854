// src/pipeline.rs
// Wires a connection subscription to the normalizer, feed, and catalog.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::catalog::CatalogIndex;
use crate::connection::{ConnectionManager, SubscriptionId};
use crate::feed::FeedAggregator;
use crate::normalize::normalize;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_messages_total", "Inbound JSON messages received.");
        describe_counter!(
            "feed_accepted_total",
            "Messages normalized into review events."
        );
        describe_counter!(
            "feed_rejected_total",
            "Messages filtered or rejected by normalization."
        );
        describe_counter!(
            "feed_unrecognized_sentiment_total",
            "Events whose sentiment signal matched no known encoding."
        );
        describe_counter!(
            "feed_paused_discarded_total",
            "Events discarded because the feed was paused."
        );
        describe_counter!(
            "feed_reconnects_total",
            "Connection drops that triggered a reconnect."
        );
    });
}

/// Subscribe the ingestion pipeline to `conn`: every inbound message is
/// normalized once, and the resulting event is recorded by both the feed
/// (subject to its pause state) and the catalog. Returns the subscription
/// handle so a caller tearing down a view can detach cleanly.
pub fn attach(
    conn: &ConnectionManager,
    feed: Arc<FeedAggregator>,
    catalog: Arc<CatalogIndex>,
) -> SubscriptionId {
    ensure_metrics_described();
    conn.subscribe(move |raw| {
        let received_at = Utc::now();
        let Some(event) = normalize(raw, received_at) else {
            counter!("feed_rejected_total").increment(1);
            return;
        };
        counter!("feed_accepted_total").increment(1);

        let event = Arc::new(event);
        // The catalog keeps indexing while the feed is paused; pause is a
        // feed-only quiet mode, not an ingestion stop.
        catalog.record_event(&event);
        if !feed.record_event(Arc::clone(&event)) {
            debug!(asin = %event.product_id, "event discarded by paused feed");
            counter!("feed_paused_discarded_total").increment(1);
        }
    })
}
