use async_trait::async_trait;
use std::sync::Arc;

use super::SignalingClient;
use crate::common::SignalError;
use crate::rendezvous::{normalize_code, RoomSnapshot, RoomStatus, RoomStore};

/// In-process client that talks to a [`RoomStore`] directly.
#[derive(Clone)]
pub struct LocalSignaling {
    store: Arc<RoomStore>,
}

impl LocalSignaling {
    pub fn new(store: Arc<RoomStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RoomStore> {
        &self.store
    }
}

fn code(raw: &str) -> Result<String, SignalError> {
    normalize_code(raw).ok_or_else(|| SignalError::Rejected {
        status: 400,
        message: "Invalid code".to_string(),
    })
}

#[async_trait]
impl SignalingClient for LocalSignaling {
    async fn create_room(&self, raw: &str) -> Result<bool, SignalError> {
        Ok(self.store.create_room(&code(raw)?).reset)
    }

    async fn join_room(&self, raw: &str) -> Result<Option<String>, SignalError> {
        Ok(self.store.join_room(&code(raw)?)?)
    }

    async fn submit_offer(&self, raw: &str, descriptor: &str) -> Result<(), SignalError> {
        Ok(self.store.submit_offer(&code(raw)?, descriptor.to_string())?)
    }

    async fn submit_answer(&self, raw: &str, descriptor: &str) -> Result<(), SignalError> {
        Ok(self.store.submit_answer(&code(raw)?, descriptor.to_string())?)
    }

    async fn get_answer(&self, raw: &str) -> Result<Option<String>, SignalError> {
        Ok(self.store.get_answer(&code(raw)?)?)
    }

    async fn check_room(&self, raw: &str) -> Result<RoomStatus, SignalError> {
        Ok(self.store.check_room(&code(raw)?))
    }

    async fn fetch_room(&self, raw: &str) -> Result<RoomSnapshot, SignalError> {
        self.store
            .snapshot(&code(raw)?)
            .ok_or(SignalError::RoomNotFound)
    }
}
