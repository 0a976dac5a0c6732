//! Relay startup and shutdown.

use crate::config::Config;
use crate::error::Result;
use crate::http::build_router;
use crate::hub::BroadcastHub;
use crate::reset::spawn_window_reset_task;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running relay.
///
/// Dropping the handle leaves the relay running; call [`RelayHandle::shutdown`]
/// to stop it.
#[derive(Debug)]
pub struct RelayHandle {
    local_addr: SocketAddr,
    hub: Arc<BroadcastHub>,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
    reset: JoinHandle<()>,
}

impl RelayHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The relay's connection hub.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Stop accepting connections and wait for the listener to close.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.server.await {
            tracing::error!("Server task failed: {}", e);
        }
        self.reset.abort();
        tracing::info!("Relay stopped");
    }
}

/// Validate the configuration, bind the listener and start serving.
pub async fn start(config: Config) -> Result<RelayHandle> {
    config.validate()?;

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let local_addr = listener.local_addr()?;

    let tick = config.limits.reset_tick();
    let hub = Arc::new(BroadcastHub::new(config)?);
    let reset = spawn_window_reset_task(Arc::clone(&hub), tick);

    let router = build_router(Arc::clone(&hub));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await;

        if let Err(e) = result {
            tracing::error!("Server error: {}", e);
        }
    });

    tracing::info!(%local_addr, "Relay listening");

    Ok(RelayHandle {
        local_addr,
        hub,
        shutdown_tx,
        server,
        reset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LimitsConfig;

    fn local_config() -> Config {
        let mut config = Config::default();
        config.server.bind_address = "127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn starts_on_ephemeral_port_and_shuts_down() {
        let handle = start(local_config()).await.unwrap();
        assert!(handle.local_addr().port() > 0);
        assert_eq!(handle.hub().connection_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = Config {
            limits: LimitsConfig {
                messages_per_window: 0,
                ..LimitsConfig::default()
            },
            ..local_config()
        };
        let err = start(config).await.unwrap_err();
        assert!(err.to_string().contains("limits.messages_per_window"));
    }

    #[tokio::test]
    async fn bad_bind_address_is_io_error() {
        let mut config = local_config();
        config.server.bind_address = "not-an-address".to_string();
        assert!(matches!(
            start(config).await,
            Err(crate::error::RelayError::Io(_))
        ));
    }
}
