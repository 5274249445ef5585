//! Runtime lifecycle: start the rendezvous service, sweep rooms, shut down.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::listener::{bind_listener, resolve_bind_addr};
use crate::common::AppConfig;
use crate::rendezvous::{create_router, spawn_sweeper, RendezvousState, RoomStore};

/// In-flight requests get this long to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A running rendezvous service.
pub struct RendezvousServer {
    addr: SocketAddr,
    store: Arc<RoomStore>,
    handle: axum_server::Handle,
    token: CancellationToken,
    sweeper: JoinHandle<()>,
    server: JoinHandle<()>,
}

impl RendezvousServer {
    /// Bind and start serving with a fresh room store.
    pub async fn start(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(RoomStore::new(config.rooms.ttl()));
        Self::start_with_store(config, store).await
    }

    pub async fn start_with_store(config: &AppConfig, store: Arc<RoomStore>) -> Result<Self> {
        let addr = resolve_bind_addr(&config.server.host, config.server.port)?;
        let listener = bind_listener(addr)?;
        let addr = listener
            .local_addr()
            .context("Failed to read bound address")?;

        let state = RendezvousState::new(store.clone());
        let app = create_router(&state);

        let token = CancellationToken::new();
        let sweeper = spawn_sweeper(
            store.clone(),
            config.rooms.sweep_interval(),
            token.child_token(),
        );

        let handle = axum_server::Handle::new();
        let server_handle = handle.clone();
        let server = tokio::spawn(async move {
            if let Err(e) = axum_server::from_tcp(listener)
                .handle(server_handle)
                .serve(app.into_make_service())
                .await
            {
                tracing::error!("Server error: {}", e);
            }
        });

        tracing::info!(%addr, ttl_secs = config.rooms.ttl_secs, "Rendezvous service listening");

        Ok(Self {
            addr,
            store,
            handle,
            token,
            sweeper,
            server,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Loopback URL usable by clients on this machine.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }

    pub fn store(&self) -> Arc<RoomStore> {
        self.store.clone()
    }

    /// Stop accepting connections, drain in-flight requests, stop the sweeper.
    pub async fn shutdown(self) -> Result<()> {
        self.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        tracing::info!("Server stopped accepting new connections");

        self.token.cancel();
        self.sweeper.await.context("Room sweeper task failed")?;
        self.server.await.context("Server task failed")?;

        tracing::info!(rooms_dropped = self.store.len(), "Server shutdown complete");
        Ok(())
    }
}

/// Run the service until Ctrl+C, then shut down gracefully.
pub async fn run_rendezvous(config: AppConfig) -> Result<()> {
    let server = RendezvousServer::start(&config).await?;
    println!("Rendezvous service on {}", server.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Ctrl+C received - initiating graceful shutdown");

    server.shutdown().await
}
