//! Connection registry and broadcast fan-out.
//!
//! The hub owns every live connection's admission state and the broadcast
//! channel all connection writers subscribe to. A validated message is
//! serialized once and the same frame goes to every subscriber, the sender
//! included.

use crate::config::{Config, ConfigError};
use crate::error::{ProtocolError, ProtocolResult};
use crate::limits::{RateLimitError, RateLimits};
use chat_core::{validate, AdmissionError, WindowCounter};
use chat_types::{ConnectionId, ContentKind, ServerEvent};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total connections registered.
    pub connections_total: AtomicU64,
    /// Total upgrades refused because `max_connections` was reached.
    pub connections_rejected: AtomicU64,
    /// Total text frames received.
    pub messages_received: AtomicU64,
    /// Total messages fanned out.
    pub messages_broadcast: AtomicU64,
    /// Total messages whose content was replaced by the blocked notice.
    pub messages_blocked: AtomicU64,
    /// Total rejections by the connection window or the global limiter.
    pub rate_limit_hits: AtomicU64,
    /// Total rejections by the size gate.
    pub oversize_rejections: AtomicU64,
    /// Total messages with a malformed envelope or unusable content field,
    /// plus rejected binary frames.
    pub invalid_messages: AtomicU64,
    /// Total internal processing failures.
    pub errors_total: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Per-connection state owned by the hub.
#[derive(Debug)]
pub struct ConnectionState {
    id: ConnectionId,
    remote_addr: SocketAddr,
    connected_at: Instant,
    counter: WindowCounter,
}

impl ConnectionState {
    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The connection's fixed-window counter.
    pub fn counter(&self) -> &WindowCounter {
        &self.counter
    }
}

/// Live connection registry plus fan-out channel.
pub struct BroadcastHub {
    config: Config,
    rate_limits: RateLimits,
    metrics: RelayMetrics,
    connections: DashMap<ConnectionId, Arc<ConnectionState>>,
    broadcast_tx: broadcast::Sender<Arc<str>>,
    /// Zero point of the millisecond clock used for admission windows.
    clock_origin: Instant,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}

impl BroadcastHub {
    /// Create a hub from configuration.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let rate_limits = RateLimits::new(&config.limits)?;
        let (broadcast_tx, _) = broadcast::channel(config.server.broadcast_capacity.max(1));
        Ok(Self {
            config,
            rate_limits,
            metrics: RelayMetrics::default(),
            connections: DashMap::new(),
            broadcast_tx,
            clock_origin: Instant::now(),
        })
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Milliseconds since the hub was created.
    pub fn now_ms(&self) -> u64 {
        self.clock_origin.elapsed().as_millis() as u64
    }

    /// Time since the hub was created.
    pub fn uptime(&self) -> std::time::Duration {
        self.clock_origin.elapsed()
    }

    /// Register a new connection with a fresh admission window.
    ///
    /// The receiver is subscribed before the connection becomes visible, so
    /// the connection sees every broadcast sent after this returns.
    pub fn register(
        &self,
        remote_addr: SocketAddr,
    ) -> (Arc<ConnectionState>, broadcast::Receiver<Arc<str>>) {
        let rx = self.broadcast_tx.subscribe();
        let state = Arc::new(ConnectionState {
            id: ConnectionId::new(),
            remote_addr,
            connected_at: Instant::now(),
            counter: WindowCounter::new(self.now_ms()),
        });
        self.connections.insert(state.id, Arc::clone(&state));
        bump(&self.metrics.connections_total);

        tracing::info!(
            connection = %state.id,
            %remote_addr,
            active = self.connections.len(),
            "Client connected"
        );
        (state, rx)
    }

    /// Remove a connection and its admission state.
    pub fn unregister(&self, id: &ConnectionId) {
        if let Some((_, state)) = self.connections.remove(id) {
            tracing::info!(
                connection = %id,
                remote_addr = %state.remote_addr,
                duration_secs = state.connected_at.elapsed().as_secs(),
                active = self.connections.len(),
                "Client disconnected"
            );
        }
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Look up a registered connection.
    pub fn connection(&self, id: &ConnectionId) -> Option<Arc<ConnectionState>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Admit, validate and broadcast one inbound text payload.
    ///
    /// # Returns
    ///
    /// The number of connections the frame was delivered to, or the reason
    /// the payload was rejected. A rejection only concerns the originating
    /// connection.
    pub fn handle_inbound(&self, conn: &ConnectionState, raw: &str) -> ProtocolResult<usize> {
        bump(&self.metrics.messages_received);

        if let Err(e) = self.rate_limits.check_message(raw, &conn.counter) {
            match &e {
                RateLimitError::Admission(AdmissionError::PayloadTooLarge { .. }) => {
                    bump(&self.metrics.oversize_rejections)
                }
                _ => bump(&self.metrics.rate_limit_hits),
            }
            tracing::warn!(connection = %conn.id, "Message rejected: {}", e);
            return Err(e.into());
        }

        let validated = validate(raw);
        match validated.kind {
            ContentKind::Blocked => bump(&self.metrics.messages_blocked),
            ContentKind::Invalid => bump(&self.metrics.invalid_messages),
            _ => {}
        }

        let frame = match ServerEvent::message(validated.envelope).to_json() {
            Ok(frame) => frame,
            Err(e) => {
                bump(&self.metrics.errors_total);
                tracing::error!(connection = %conn.id, "Failed to encode message: {}", e);
                ServerEvent::message(chat_core::validate::fallback(raw))
                    .to_json()
                    .map_err(ProtocolError::Serialization)?
            }
        };

        Ok(self.broadcast(frame))
    }

    /// Send one serialized frame to every subscribed connection.
    ///
    /// Returns the number of receivers; zero when nobody is connected.
    pub fn broadcast(&self, frame: impl Into<Arc<str>>) -> usize {
        bump(&self.metrics.messages_broadcast);
        self.broadcast_tx.send(frame.into()).unwrap_or(0)
    }

    /// Start a new window for every connection whose window has elapsed.
    ///
    /// Returns the number of connections reset.
    pub fn reset_elapsed_windows(&self) -> usize {
        let now_ms = self.now_ms();
        let window = self.rate_limits.policy().window;
        self.connections
            .iter()
            .filter(|entry| entry.counter.roll_if_elapsed(now_ms, window))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;
    use chat_core::BLOCKED_NOTICE;
    use serde_json::Value;
    use std::time::Duration;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn test_hub(messages_per_window: u32) -> BroadcastHub {
        let config = Config {
            limits: LimitsConfig {
                messages_per_window,
                window_secs: 60,
                max_text_bytes: 1024,
                max_image_bytes: 4096,
                ..LimitsConfig::default()
            },
            ..Config::default()
        };
        BroadcastHub::new(config).unwrap()
    }

    fn decode(frame: &str) -> ServerEvent {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn register_and_unregister() {
        let hub = test_hub(5);
        let (a, _rx_a) = hub.register(addr());
        let (b, _rx_b) = hub.register(addr());

        assert_eq!(hub.connection_count(), 2);
        assert_ne!(a.id(), b.id());
        assert!(hub.connection(&a.id()).is_some());

        hub.unregister(&a.id());
        assert_eq!(hub.connection_count(), 1);
        assert!(hub.connection(&a.id()).is_none());

        // Unregistering twice is harmless
        hub.unregister(&a.id());
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.metrics().connections_total.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn message_reaches_every_connection_including_sender() {
        let hub = test_hub(5);
        let (sender, mut rx_sender) = hub.register(addr());
        let (_peer, mut rx_peer) = hub.register(addr());

        let delivered = hub
            .handle_inbound(&sender, r#"{"nombre":"ana","mensaje":"hola <b>"}"#)
            .unwrap();
        assert_eq!(delivered, 2);

        let own = rx_sender.recv().await.unwrap();
        let peer = rx_peer.recv().await.unwrap();
        assert_eq!(own, peer);

        match decode(&own) {
            ServerEvent::Message(data) => {
                assert_eq!(data["mensaje"], "hola &lt;b&gt;");
                assert_eq!(data["nombre"], "ana");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn injection_is_broadcast_as_notice() {
        let hub = test_hub(5);
        let (sender, mut rx) = hub.register(addr());

        hub.handle_inbound(&sender, r#"{"mensaje":"<script>alert(1)</script>"}"#)
            .unwrap();

        let ServerEvent::Message(data) = decode(&rx.recv().await.unwrap()) else {
            panic!("expected message event");
        };
        assert_eq!(data["mensaje"], Value::from(BLOCKED_NOTICE));
        assert_eq!(hub.metrics().messages_blocked.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn malformed_envelope_broadcasts_empty_content() {
        let hub = test_hub(5);
        let (sender, mut rx) = hub.register(addr());

        hub.handle_inbound(&sender, "not json").unwrap();

        let ServerEvent::Message(data) = decode(&rx.recv().await.unwrap()) else {
            panic!("expected message event");
        };
        assert_eq!(data["mensaje"], "");
        assert_eq!(hub.metrics().invalid_messages.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn empty_content_is_not_counted_invalid() {
        let hub = test_hub(5);
        let (sender, mut rx) = hub.register(addr());

        hub.handle_inbound(&sender, r#"{"mensaje":""}"#).unwrap();
        hub.handle_inbound(&sender, r#"{"mensaje":7}"#).unwrap();

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        assert_eq!(hub.metrics().invalid_messages.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn window_limit_rejects_without_broadcast() {
        let hub = test_hub(2);
        let (sender, mut rx) = hub.register(addr());

        assert!(hub.handle_inbound(&sender, r#"{"mensaje":"1"}"#).is_ok());
        assert!(hub.handle_inbound(&sender, r#"{"mensaje":"2"}"#).is_ok());

        let err = hub
            .handle_inbound(&sender, r#"{"mensaje":"3"}"#)
            .unwrap_err();
        assert!(err.notice().starts_with("Too many messages"));

        // Only the two admitted messages were broadcast
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(hub.metrics().rate_limit_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn oversized_payload_rejected_and_counted() {
        let hub = test_hub(5);
        let (sender, _rx) = hub.register(addr());

        let raw = format!(r#"{{"mensaje":"{}"}}"#, "x".repeat(2000));
        let err = hub.handle_inbound(&sender, &raw).unwrap_err();
        assert!(err.notice().starts_with("Message too large"));
        assert_eq!(hub.metrics().oversize_rejections.load(Ordering::Relaxed), 1);
        assert_eq!(sender.counter().count(), 0);
    }

    #[tokio::test]
    async fn broadcast_without_connections_is_not_an_error() {
        let hub = test_hub(5);
        assert_eq!(hub.broadcast("frame"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_elapsed_windows_reopens_full_windows() {
        let hub = test_hub(1);
        let (a, _rx_a) = hub.register(addr());
        let (b, _rx_b) = hub.register(addr());

        hub.handle_inbound(&a, r#"{"mensaje":"a"}"#).unwrap();
        hub.handle_inbound(&b, r#"{"mensaje":"b"}"#).unwrap();
        assert!(hub.handle_inbound(&a, r#"{"mensaje":"a"}"#).is_err());

        // Nothing to reset before the window ends
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(hub.reset_elapsed_windows(), 0);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(hub.reset_elapsed_windows(), 2);
        assert_eq!(a.counter().count(), 0);
        assert!(hub.handle_inbound(&a, r#"{"mensaje":"a"}"#).is_ok());
    }
}
