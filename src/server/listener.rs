//! Listening socket setup for the rendezvous service.

use anyhow::{Context, Result};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

/// Resolve `host:port`, taking the first address the resolver returns.
pub fn resolve_bind_addr(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve bind address {host}:{port}"))?
        .next()
        .with_context(|| format!("No usable address for {host}:{port}"))
}

/// Bind a non-blocking std listener ready to hand to `axum_server::from_tcp`.
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).with_context(|| {
        format!(
            "Failed to bind to {addr} - port already in use.\n\n\
             Is another codedrop instance running?\n\
             Or is another service using this port?"
        )
    })?;

    listener
        .set_nonblocking(true)
        .context("Failed to set listener to non-blocking mode")?;

    Ok(listener)
}
