// src/connection.rs
// Connection manager for the event source: one long-lived transport, a
// broadcast subscriber registry, and bounded automatic reconnection.
//
// The transport is behind a trait so tests can drive the manager with a
// scripted stream instead of a live WebSocket.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use metrics::counter;
use serde_json::Value;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::reconnect::{ReconnectConfig, ReconnectPolicy};

/// One open stream of inbound text messages from the event source.
#[async_trait]
pub trait MessageStream: Send {
    /// Next inbound message. `None` means the source closed the stream
    /// cleanly; `Some(Err(_))` means the connection dropped.
    async fn next_message(&mut self) -> Option<Result<String>>;
}

/// Factory for opening connections to the event source.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self) -> Result<Box<dyn MessageStream>>;
}

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> Result<Box<dyn MessageStream>> {
        let (ws, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("connecting to event source at {}", self.url))?;
        Ok(Box::new(WsStream { inner: ws }))
    }
}

struct WsStream {
    inner: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl MessageStream for WsStream {
    async fn next_message(&mut self) -> Option<Result<String>> {
        while let Some(frame) = self.inner.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Control and binary frames carry no events.
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}

/// Opaque handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscriber {
    id: u64,
    handler: Arc<dyn Fn(&Value) + Send + Sync>,
}

#[derive(Default)]
struct SubscriberRegistry {
    entries: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    fn add(&self, handler: Arc<dyn Fn(&Value) + Send + Sync>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .expect("subscriber mutex poisoned")
            .push(Subscriber { id, handler });
        SubscriptionId(id)
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock().expect("subscriber mutex poisoned");
        let before = entries.len();
        entries.retain(|s| s.id != id.0);
        entries.len() != before
    }

    /// Deliver one message to every subscriber, in registration order.
    ///
    /// The lock is not held across handler calls, so a handler may
    /// unsubscribe (itself or others) without deadlocking. Membership is
    /// re-checked before each delivery: a subscriber removed mid-dispatch
    /// does not receive the in-flight message.
    fn dispatch(&self, message: &Value) {
        let snapshot: Vec<Subscriber> = self
            .entries
            .lock()
            .expect("subscriber mutex poisoned")
            .clone();
        for sub in snapshot {
            let still_registered = self
                .entries
                .lock()
                .expect("subscriber mutex poisoned")
                .iter()
                .any(|s| s.id == sub.id);
            if still_registered {
                (sub.handler)(message);
            }
        }
    }
}

/// Owns the single connection to the event source and fans inbound messages
/// out to subscribers. Lifecycle: construct → `connect` → `subscribe`/
/// `unsubscribe` → `disconnect`.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    reconnect: ReconnectConfig,
    subscribers: Arc<SubscriberRegistry>,
    active: Arc<AtomicBool>,
    /// Shutdown handle for the current session only. Each `connect` installs
    /// a fresh one so a stray `disconnect` can never leave behind a permit
    /// that kills a later session.
    session_shutdown: Mutex<Option<Arc<Notify>>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, reconnect: ReconnectConfig) -> Self {
        Self {
            transport,
            reconnect,
            subscribers: Arc::new(SubscriberRegistry::default()),
            active: Arc::new(AtomicBool::new(false)),
            session_shutdown: Mutex::new(None),
        }
    }

    /// Register a handler that receives every inbound message. Each
    /// subscriber sees every message independently; this is a broadcast, not
    /// a queue drained once.
    pub fn subscribe(&self, handler: impl Fn(&Value) + Send + Sync + 'static) -> SubscriptionId {
        self.subscribers.add(Arc::new(handler))
    }

    /// Remove a subscriber. Synchronous and leak-free: once this returns the
    /// handler will not be invoked again.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// Establish the connection and start the receive loop on a background
    /// task. Idempotent: repeated calls while a session is active are no-ops,
    /// so at most one connect attempt is ever in flight.
    pub fn connect(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            debug!("connect called while already active, ignoring");
            return;
        }
        let shutdown = Arc::new(Notify::new());
        *self
            .session_shutdown
            .lock()
            .expect("session mutex poisoned") = Some(Arc::clone(&shutdown));

        let transport = Arc::clone(&self.transport);
        let subscribers = Arc::clone(&self.subscribers);
        let active = Arc::clone(&self.active);
        let policy = ReconnectPolicy::new(self.reconnect.clone());
        tokio::spawn(run_loop(transport, subscribers, active, shutdown, policy));
    }

    /// Stop the current session's receive loop. Without an active session
    /// this is a no-op; a later `connect` starts a fresh session either way.
    pub fn disconnect(&self) {
        let handle = self
            .session_shutdown
            .lock()
            .expect("session mutex poisoned")
            .take();
        if let Some(shutdown) = handle {
            shutdown.notify_one();
        } else {
            debug!("disconnect called without an active session, ignoring");
        }
    }

    /// Whether a session task is alive. This stays `true` through transport
    /// drops and the backoff phase; it tracks the session, not the socket.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

async fn run_loop(
    transport: Arc<dyn Transport>,
    subscribers: Arc<SubscriberRegistry>,
    active: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    mut policy: ReconnectPolicy,
) {
    'session: loop {
        let mut stream = match transport.open().await {
            Ok(stream) => {
                info!("connected to event source");
                policy.reset();
                stream
            }
            Err(e) => {
                warn!(error = ?e, "failed to connect to event source");
                if !backoff_or_shutdown(&mut policy, &shutdown).await {
                    break 'session;
                }
                continue 'session;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("disconnect requested, stopping receive loop");
                    break 'session;
                }
                msg = stream.next_message() => match msg {
                    Some(Ok(text)) => deliver(&subscribers, &text),
                    Some(Err(e)) => {
                        warn!(error = ?e, "connection to event source lost");
                        counter!("feed_reconnects_total").increment(1);
                        break;
                    }
                    None => {
                        info!("event source closed the stream");
                        counter!("feed_reconnects_total").increment(1);
                        break;
                    }
                }
            }
        }

        if !backoff_or_shutdown(&mut policy, &shutdown).await {
            break 'session;
        }
    }
    active.store(false, Ordering::SeqCst);
}

/// Sleep out the next backoff delay. Returns `false` when the retry budget is
/// spent or a shutdown arrives during the wait.
async fn backoff_or_shutdown(policy: &mut ReconnectPolicy, shutdown: &Notify) -> bool {
    let Some(delay) = policy.next_delay() else {
        error!(
            attempts = policy.attempts(),
            "reconnect budget exhausted, giving up"
        );
        return false;
    };
    let delay_ms = delay.as_millis() as u64;
    debug!(delay_ms, "waiting before reconnect");
    tokio::select! {
        _ = shutdown.notified() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Parse one inbound text frame and broadcast it. Frames that are not JSON
/// are skipped here; shape-level filtering belongs to the normalizer.
fn deliver(subscribers: &SubscriberRegistry, text: &str) {
    match serde_json::from_str::<Value>(text) {
        Ok(message) => {
            counter!("feed_messages_total").increment(1);
            subscribers.dispatch(&message);
        }
        Err(e) => debug!(error = ?e, "dropping non-JSON frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatch_skips_subscriber_removed_mid_flight() {
        let registry = Arc::new(SubscriberRegistry::default());

        let first_seen = Arc::new(AtomicU64::new(0));
        let second_seen = Arc::new(AtomicU64::new(0));

        // Pre-allocate the second subscriber's id slot by registering in order:
        // the first handler unsubscribes the second during dispatch.
        let second_id = Arc::new(Mutex::new(None::<SubscriptionId>));

        let reg = Arc::clone(&registry);
        let slot = Arc::clone(&second_id);
        let seen = Arc::clone(&first_seen);
        registry.add(Arc::new(move |_msg| {
            seen.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = slot.lock().expect("test mutex").take() {
                reg.remove(id);
            }
        }));

        let seen = Arc::clone(&second_seen);
        let id = registry.add(Arc::new(move |_msg| {
            seen.fetch_add(1, Ordering::Relaxed);
        }));
        *second_id.lock().expect("test mutex") = Some(id);

        registry.dispatch(&json!({"n": 1}));
        registry.dispatch(&json!({"n": 2}));

        // First subscriber saw both messages; the second saw neither, because
        // it was removed before its turn in the first dispatch.
        assert_eq!(first_seen.load(Ordering::Relaxed), 2);
        assert_eq!(second_seen.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn unsubscribe_reports_membership() {
        let registry = SubscriberRegistry::default();
        let id = registry.add(Arc::new(|_| {}));
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
    }

    #[test]
    fn non_json_frames_are_dropped() {
        let registry = SubscriberRegistry::default();
        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        registry.add(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));
        deliver(&registry, "not json at all");
        deliver(&registry, "{\"ok\":true}");
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }
}
