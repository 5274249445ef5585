//! The ordered, reliable, bidirectional byte channel files travel over.

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::common::ChannelError;

pub use memory::{LinkProfile, MemoryChannel, MemoryEndpoint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(Bytes),
    Closed,
}

/// Message-oriented peer transport with a queryable send buffer.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Queue one message. Fails only once the channel is closed.
    async fn send(&self, payload: Bytes) -> Result<(), ChannelError>;

    /// Bytes queued locally and not yet handed to the peer.
    fn buffered_amount(&self) -> u64;

    fn is_open(&self) -> bool;

    fn close(&self);
}

/// One side of an established channel plus its inbound event stream.
pub struct ChannelEndpoint {
    pub channel: Arc<dyn PeerChannel>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}
