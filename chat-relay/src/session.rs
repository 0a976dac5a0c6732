//! Per-connection session management.
//!
//! Each WebSocket gets a Session. The reader loop processes inbound frames
//! in arrival order; a writer task forwards broadcasts and this connection's
//! error notices to the socket.

use crate::error::ProtocolError;
use crate::hub::{BroadcastHub, ConnectionState};
use axum::extract::ws::{Message, WebSocket};
use chat_types::{ConnectionId, ServerEvent};
use futures_util::{Sink, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

/// Capacity of the per-connection notice queue.
const NOTICE_QUEUE: usize = 32;

/// Most broadcasts written in a row while a notice is pending.
const MAX_NOTICE_DELAY: usize = 16;

/// Result of handling one inbound frame.
#[derive(Debug, PartialEq)]
pub enum FrameOutcome {
    /// Frame processed (or ignored); nothing to tell the client.
    Handled,
    /// Frame rejected; send this notice to the originating connection only.
    Notice(String),
    /// Client closed the connection.
    Closed,
}

/// A per-connection session.
pub struct Session {
    hub: Arc<BroadcastHub>,
    state: Arc<ConnectionState>,
}

impl Session {
    /// Create a session for an already registered connection.
    pub fn new(hub: Arc<BroadcastHub>, state: Arc<ConnectionState>) -> Self {
        Self { hub, state }
    }

    /// Handle one inbound frame.
    pub fn handle_frame(&self, frame: Message) -> FrameOutcome {
        let result = match frame {
            Message::Text(text) => self.hub.handle_inbound(&self.state, &text).map(|delivered| {
                tracing::debug!(connection = %self.state.id(), delivered, "Message broadcast");
            }),
            Message::Binary(bytes) => {
                self.hub
                    .metrics()
                    .invalid_messages
                    .fetch_add(1, Ordering::Relaxed);
                Err(ProtocolError::InvalidMessage {
                    reason: format!("binary frame ({} bytes)", bytes.len()),
                })
            }
            Message::Close(_) => return FrameOutcome::Closed,
            // axum answers pings itself
            Message::Ping(_) | Message::Pong(_) => Ok(()),
        };

        match result {
            Ok(()) => FrameOutcome::Handled,
            Err(e) => {
                if matches!(e, ProtocolError::InvalidMessage { .. }) {
                    tracing::warn!(connection = %self.state.id(), "Rejected frame: {}", e);
                }
                FrameOutcome::Notice(e.notice())
            }
        }
    }

    /// Run the session until the client disconnects.
    pub async fn run(self, socket: WebSocket, rx: broadcast::Receiver<Arc<str>>) {
        let id = self.state.id();
        let (ws_tx, mut ws_rx) = socket.split();
        let (notice_tx, notice_rx) = mpsc::channel::<String>(NOTICE_QUEUE);

        let writer = tokio::spawn(write_loop(ws_tx, rx, notice_rx, id));

        while let Some(frame) = ws_rx.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(connection = %id, "WebSocket read error: {}", e);
                    break;
                }
            };

            match self.handle_frame(frame) {
                FrameOutcome::Handled => {}
                FrameOutcome::Notice(notice) => {
                    if notice_tx.send(notice).await.is_err() {
                        // Writer is gone, so the socket is too
                        break;
                    }
                }
                FrameOutcome::Closed => break,
            }
        }

        self.hub.unregister(&id);
        drop(notice_tx);
        writer.abort();
    }
}

/// Forward broadcasts and notices to the socket until either source closes
/// or a write fails.
///
/// Broadcasts go first so a notice does not overtake frames queued before
/// it, but a pending notice never waits behind more than
/// [`MAX_NOTICE_DELAY`] broadcasts in a row.
async fn write_loop<S>(
    mut ws_tx: S,
    mut rx: broadcast::Receiver<Arc<str>>,
    mut notice_rx: mpsc::Receiver<String>,
    id: ConnectionId,
) where
    S: Sink<Message> + Unpin,
{
    let mut streak = 0;
    loop {
        if streak >= MAX_NOTICE_DELAY {
            streak = 0;
            if let Ok(notice) = notice_rx.try_recv() {
                let Some(text) = encode_notice(notice, id) else {
                    continue;
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
                continue;
            }
        }

        let text = tokio::select! {
            biased;
            frame = rx.recv() => match frame {
                Ok(frame) => {
                    streak += 1;
                    frame.to_string()
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(connection = %id, skipped, "Slow client skipped broadcasts");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            notice = notice_rx.recv() => match notice {
                Some(notice) => {
                    streak = 0;
                    match encode_notice(notice, id) {
                        Some(text) => text,
                        None => continue,
                    }
                }
                None => break,
            },
        };

        if ws_tx.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

fn encode_notice(notice: String, id: ConnectionId) -> Option<String> {
    match ServerEvent::error(notice).to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!(connection = %id, "Failed to encode notice: {}", e);
            None
        }
    }
}

/// Register a new connection and run its session to completion.
pub async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>, remote_addr: SocketAddr) {
    let (state, rx) = hub.register(remote_addr);
    Session::new(hub, state).run(socket, rx).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LimitsConfig};

    fn test_session(messages_per_window: u32) -> (Session, broadcast::Receiver<Arc<str>>) {
        let config = Config {
            limits: LimitsConfig {
                messages_per_window,
                ..LimitsConfig::default()
            },
            ..Config::default()
        };
        let hub = Arc::new(BroadcastHub::new(config).unwrap());
        let (state, rx) = hub.register("127.0.0.1:50000".parse().unwrap());
        (Session::new(hub, state), rx)
    }

    #[tokio::test]
    async fn text_frame_is_broadcast() {
        let (session, mut rx) = test_session(5);

        let outcome = session.handle_frame(Message::Text(r#"{"mensaje":"hi"}"#.into()));
        assert_eq!(outcome, FrameOutcome::Handled);

        let frame = rx.recv().await.unwrap();
        assert_eq!(&*frame, r#"{"event":"message","data":{"mensaje":"hi"}}"#);
    }

    #[tokio::test]
    async fn binary_frame_gets_notice() {
        let (session, mut rx) = test_session(5);

        let outcome = session.handle_frame(Message::Binary(vec![1, 2, 3]));
        assert!(matches!(outcome, FrameOutcome::Notice(ref n) if n.starts_with("Invalid message")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rate_limited_frame_gets_notice() {
        let (session, _rx) = test_session(1);

        assert_eq!(
            session.handle_frame(Message::Text(r#"{"mensaje":"1"}"#.into())),
            FrameOutcome::Handled
        );
        match session.handle_frame(Message::Text(r#"{"mensaje":"2"}"#.into())) {
            FrameOutcome::Notice(notice) => assert!(notice.contains("1 messages every 60 seconds")),
            other => panic!("expected notice, got {:?}", other),
        }
    }

    /// A sink that forwards every written frame to a channel.
    fn capture_sink() -> (
        impl Sink<Message, Error = ()> + Unpin,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = futures_util::sink::unfold(tx, |tx, frame: Message| async move {
            match tx.send(frame) {
                Ok(()) => Ok(tx),
                Err(_) => Err(()),
            }
        });
        (Box::pin(sink), rx)
    }

    async fn written_texts(broadcasts: usize, notice: &str) -> Vec<String> {
        let (tx, rx) = broadcast::channel(64);
        for i in 0..broadcasts {
            tx.send(Arc::from(format!("b{i}"))).unwrap();
        }
        let (notice_tx, notice_rx) = mpsc::channel(4);
        notice_tx.send(notice.to_string()).await.unwrap();
        // The loop ends once the closed notice queue is drained and no
        // broadcast is ready; `tx` stays alive like the hub's sender.
        drop(notice_tx);

        let (sink, mut out) = capture_sink();
        write_loop(sink, rx, notice_rx, ConnectionId::new()).await;
        drop(tx);

        let mut texts = Vec::new();
        while let Ok(frame) = out.try_recv() {
            if let Message::Text(text) = frame {
                texts.push(text);
            }
        }
        texts
    }

    #[tokio::test]
    async fn notice_follows_broadcasts_queued_before_it() {
        let texts = written_texts(2, "slow down").await;
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[0], "b0");
        assert_eq!(texts[1], "b1");
        assert_eq!(texts[2], r#"{"event":"error","data":"slow down"}"#);
    }

    #[tokio::test]
    async fn notice_is_not_starved_by_broadcast_backlog() {
        let texts = written_texts(40, "slow down").await;
        assert_eq!(texts.len(), 41);
        let position = texts
            .iter()
            .position(|t| t.contains("slow down"))
            .unwrap();
        assert_eq!(position, MAX_NOTICE_DELAY);
        assert_eq!(texts.last().map(String::as_str), Some("b39"));
    }

    #[tokio::test]
    async fn close_and_control_frames() {
        let (session, _rx) = test_session(5);

        assert_eq!(session.handle_frame(Message::Close(None)), FrameOutcome::Closed);
        assert_eq!(session.handle_frame(Message::Ping(vec![])), FrameOutcome::Handled);
        assert_eq!(session.handle_frame(Message::Pong(vec![])), FrameOutcome::Handled);
    }
}
