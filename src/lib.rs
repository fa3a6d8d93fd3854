// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod event;
pub mod feed;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod reconnect;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::catalog::{
    CatalogIndex, FilterCriteria, ProductFilter, ProductOption, SentimentFilter, Tally,
    TallyRecord, TimeRange,
};
pub use crate::connection::{ConnectionManager, MessageStream, SubscriptionId, Transport, WsTransport};
pub use crate::event::{ReviewEvent, Sentiment, SentimentCounts};
pub use crate::feed::{FeedAggregator, DEFAULT_WINDOW_CAPACITY};
pub use crate::normalize::normalize;
pub use crate::reconnect::{ReconnectConfig, ReconnectPolicy};
