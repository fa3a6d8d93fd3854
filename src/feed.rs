// src/feed.rs
// Bounded recent-events window plus running sentiment counters.
//
// The window and the counters are deliberately two separate structures: the
// window evicts from the tail at capacity while the counters keep counting
// every accepted event for the whole session. Pausing discards incoming
// events outright; nothing is buffered for replay.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::event::{ReviewEvent, SentimentCounts};

/// Default number of most-recent events retained, newest first.
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedState {
    Active,
    Paused,
}

#[derive(Debug)]
struct Inner {
    /// Most-recent accepted events, newest at the front, capped at `capacity`.
    window: VecDeque<Arc<ReviewEvent>>,
    /// Session-lifetime counters, independent of window eviction.
    counts: SentimentCounts,
    state: FeedState,
}

/// Thread-safe feed aggregator with a bounded window and pause semantics.
#[derive(Debug)]
pub struct FeedAggregator {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for FeedAggregator {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_CAPACITY)
    }
}

impl FeedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                window: VecDeque::with_capacity(capacity.min(10_000)),
                counts: SentimentCounts::default(),
                state: FeedState::Active,
            }),
            capacity,
        }
    }

    /// Record one accepted event: prepend to the window, evict from the tail
    /// past capacity, bump the sentiment counter. While paused the event is
    /// discarded entirely and `false` is returned.
    pub fn record_event(&self, event: Arc<ReviewEvent>) -> bool {
        let mut inner = self.inner.lock().expect("feed mutex poisoned");
        if inner.state == FeedState::Paused {
            debug!(asin = %event.product_id, "feed paused, discarding event");
            return false;
        }

        inner.counts.increment(event.sentiment);
        inner.window.push_front(event);
        while inner.window.len() > self.capacity {
            inner.window.pop_back();
        }
        true
    }

    /// Stop observing. Events arriving while paused are dropped, not buffered.
    pub fn pause(&self) {
        self.inner.lock().expect("feed mutex poisoned").state = FeedState::Paused;
    }

    pub fn resume(&self) {
        self.inner.lock().expect("feed mutex poisoned").state = FeedState::Active;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().expect("feed mutex poisoned").state == FeedState::Paused
    }

    /// Snapshot of the window, newest first.
    pub fn window(&self) -> Vec<Arc<ReviewEvent>> {
        let inner = self.inner.lock().expect("feed mutex poisoned");
        inner.window.iter().cloned().collect()
    }

    /// Window entries whose product id contains `query`, case-insensitively.
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<Arc<ReviewEvent>> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().expect("feed mutex poisoned");
        inner
            .window
            .iter()
            .filter(|ev| ev.product_id.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn counts(&self) -> SentimentCounts {
        self.inner.lock().expect("feed mutex poisoned").counts
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
