//! Peer channel wrappers that inject failures.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use codedrop::channel::PeerChannel;
use codedrop::common::ChannelError;

/// Refuses any message containing `marker` but otherwise stays open.
pub struct RejectingChannel {
    pub inner: Arc<dyn PeerChannel>,
    pub marker: &'static str,
}

#[async_trait]
impl PeerChannel for RejectingChannel {
    async fn send(&self, payload: Bytes) -> Result<(), ChannelError> {
        let text = String::from_utf8_lossy(&payload);
        if text.contains(self.marker) {
            return Err(ChannelError::Closed);
        }
        self.inner.send(payload).await
    }

    fn buffered_amount(&self) -> u64 {
        self.inner.buffered_amount()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn close(&self) {
        self.inner.close();
    }
}

/// Closes the underlying channel after `allowed` successful sends.
pub struct ClosingChannel {
    pub inner: Arc<dyn PeerChannel>,
    remaining: AtomicUsize,
}

impl ClosingChannel {
    pub fn new(inner: Arc<dyn PeerChannel>, allowed: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl PeerChannel for ClosingChannel {
    async fn send(&self, payload: Bytes) -> Result<(), ChannelError> {
        self.inner.send(payload).await?;
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.close();
        }
        Ok(())
    }

    fn buffered_amount(&self) -> u64 {
        self.inner.buffered_amount()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn close(&self) {
        self.inner.close();
    }
}
