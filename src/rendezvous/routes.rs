//! Router for the rendezvous service.

use axum::{extract::DefaultBodyLimit, routing::*, Router};

use super::handlers;
use super::state::RendezvousState;

/// Descriptors are a few KiB of SDP.
const MAX_SIGNAL_BODY_BYTES: usize = 256 * 1024;

/// Build the `/signal` + `/health` router.
pub fn create_router(state: &RendezvousState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/signal",
            get(handlers::signal_get).post(handlers::signal_post),
        )
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(MAX_SIGNAL_BODY_BYTES))
}
