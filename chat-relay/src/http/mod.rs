//! HTTP endpoints for chat-relay.
//!
//! Serves the WebSocket upgrade plus health and metrics on one listener.

pub mod health;
mod metrics;

use crate::hub::BroadcastHub;
use crate::protocol::ws_handler;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(hub: Arc<BroadcastHub>) -> Router {
    let mut router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health::health_handler));

    if hub.config().http.metrics_enabled {
        router = router.route("/metrics", get(metrics::metrics_handler));
    }

    router.layer(Extension(hub))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, HttpConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn test_hub(config: Config) -> Arc<BroadcastHub> {
        Arc::new(BroadcastHub::new(config).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = build_router(test_hub(Config::default()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let app = build_router(test_hub(Config::default()));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_can_be_disabled() {
        let config = Config {
            http: HttpConfig {
                metrics_enabled: false,
            },
            ..Config::default()
        };
        let app = build_router(test_hub(config));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn plain_get_on_ws_is_not_upgraded() {
        let app = build_router(test_hub(Config::default()));

        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(!response.status().is_success());
    }
}
