//! WebSocket upgrade handler for `GET /ws`.

use crate::hub::BroadcastHub;
use crate::session;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ConnectInfo;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Accept a WebSocket upgrade unless the relay is at capacity.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    Extension(hub): Extension<Arc<BroadcastHub>>,
) -> Response {
    let max_connections = hub.config().server.max_connections;
    if hub.connection_count() >= max_connections {
        tracing::warn!(
            "Connection limit reached ({}/{}), rejecting {}",
            hub.connection_count(),
            max_connections,
            remote_addr
        );
        hub.metrics()
            .connections_rejected
            .fetch_add(1, Ordering::Relaxed);
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let max_frame = hub.config().server.max_frame_bytes;
    ws.max_message_size(max_frame)
        .max_frame_size(max_frame)
        .on_upgrade(move |socket| session::handle_socket(socket, hub, remote_addr))
}
