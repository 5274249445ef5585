use std::sync::Arc;

use super::store::RoomStore;

/// Shared handler state for the rendezvous router.
#[derive(Clone)]
pub struct RendezvousState {
    pub store: Arc<RoomStore>,
}

impl RendezvousState {
    pub fn new(store: Arc<RoomStore>) -> Self {
        Self { store }
    }
}
