//! Health check endpoint.

use crate::hub::BroadcastHub;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of active connections.
    pub connections: usize,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Current time, unix milliseconds.
    pub ts: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(hub): Extension<Arc<BroadcastHub>>) -> Json<HealthStatus> {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: hub.connection_count(),
        uptime_seconds: hub.uptime().as_secs(),
        ts,
    })
}
