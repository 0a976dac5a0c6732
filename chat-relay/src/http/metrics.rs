//! Prometheus metrics endpoint.

use crate::hub::BroadcastHub;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(hub): Extension<Arc<BroadcastHub>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render_metrics(&hub),
    )
}

fn render_metrics(hub: &BroadcastHub) -> String {
    let m = hub.metrics();

    // Gauges
    let connections = hub.connection_count();

    // Counters
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let conns_rejected = m.connections_rejected.load(Ordering::Relaxed);
    let received = m.messages_received.load(Ordering::Relaxed);
    let broadcast = m.messages_broadcast.load(Ordering::Relaxed);
    let blocked = m.messages_blocked.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let oversize = m.oversize_rejections.load(Ordering::Relaxed);
    let invalid = m.invalid_messages.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    format!(
        r#"# HELP murmur_relay_connections_active Number of active connections
# TYPE murmur_relay_connections_active gauge
murmur_relay_connections_active {connections}

# HELP murmur_relay_info Server information
# TYPE murmur_relay_info gauge
murmur_relay_info{{version="{version}"}} 1

# HELP murmur_relay_connections_total Total connections accepted
# TYPE murmur_relay_connections_total counter
murmur_relay_connections_total {conns_total}

# HELP murmur_relay_connections_rejected_total Upgrades refused at the connection limit
# TYPE murmur_relay_connections_rejected_total counter
murmur_relay_connections_rejected_total {conns_rejected}

# HELP murmur_relay_messages_received_total Total text frames received
# TYPE murmur_relay_messages_received_total counter
murmur_relay_messages_received_total {received}

# HELP murmur_relay_messages_broadcast_total Total messages fanned out
# TYPE murmur_relay_messages_broadcast_total counter
murmur_relay_messages_broadcast_total {broadcast}

# HELP murmur_relay_messages_blocked_total Messages replaced by the blocked notice
# TYPE murmur_relay_messages_blocked_total counter
murmur_relay_messages_blocked_total {blocked}

# HELP murmur_relay_rate_limit_hits_total Total rate limit rejections
# TYPE murmur_relay_rate_limit_hits_total counter
murmur_relay_rate_limit_hits_total {rate_limits}

# HELP murmur_relay_oversize_rejections_total Total payloads rejected by the size gate
# TYPE murmur_relay_oversize_rejections_total counter
murmur_relay_oversize_rejections_total {oversize}

# HELP murmur_relay_invalid_messages_total Malformed envelopes and rejected frames
# TYPE murmur_relay_invalid_messages_total counter
murmur_relay_invalid_messages_total {invalid}

# HELP murmur_relay_errors_total Total internal processing errors
# TYPE murmur_relay_errors_total counter
murmur_relay_errors_total {errors}
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}
