//! In-process channel pair with a configurable link profile.
//!
//! Each direction is drained by a pump task. Bytes count as buffered from
//! `send` until the pump hands them to the peer, so a slow or stalled link
//! builds up `buffered_amount` the way a congested data channel does.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{ChannelEndpoint, ChannelEvent, PeerChannel};
use crate::common::ChannelError;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinkProfile {
    /// Time the pump spends delivering each message.
    pub delay_per_message: Duration,
    /// Start with both directions stalled.
    pub stalled: bool,
}

impl LinkProfile {
    pub fn with_delay(delay_per_message: Duration) -> Self {
        Self {
            delay_per_message,
            stalled: false,
        }
    }
}

pub struct MemoryChannel {
    outbound: mpsc::UnboundedSender<Bytes>,
    buffered: Arc<AtomicU64>,
    peak_buffered: AtomicU64,
    stalled: watch::Sender<bool>,
    link: CancellationToken,
}

/// A memory channel end before it is erased to `dyn PeerChannel`.
pub struct MemoryEndpoint {
    pub channel: Arc<MemoryChannel>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl MemoryEndpoint {
    pub fn into_endpoint(self) -> ChannelEndpoint {
        ChannelEndpoint {
            channel: self.channel,
            events: self.events,
        }
    }
}

impl MemoryChannel {
    /// Build two connected ends. Both receive `ChannelEvent::Open` first.
    pub fn pair(profile: LinkProfile) -> (MemoryEndpoint, MemoryEndpoint) {
        let link = CancellationToken::new();
        let (a_events_tx, a_events) = mpsc::unbounded_channel();
        let (b_events_tx, b_events) = mpsc::unbounded_channel();
        let _ = a_events_tx.send(ChannelEvent::Open);
        let _ = b_events_tx.send(ChannelEvent::Open);

        let a = Self::spawn_end(profile, link.clone(), b_events_tx);
        let b = Self::spawn_end(profile, link, a_events_tx);

        (
            MemoryEndpoint {
                channel: a,
                events: a_events,
            },
            MemoryEndpoint {
                channel: b,
                events: b_events,
            },
        )
    }

    fn spawn_end(
        profile: LinkProfile,
        link: CancellationToken,
        deliver: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let buffered = Arc::new(AtomicU64::new(0));
        let (stalled, stalled_rx) = watch::channel(profile.stalled);

        tokio::spawn(pump(
            outbound_rx,
            deliver,
            buffered.clone(),
            stalled_rx,
            profile.delay_per_message,
            link.clone(),
        ));

        Arc::new(Self {
            outbound,
            buffered,
            peak_buffered: AtomicU64::new(0),
            stalled,
            link,
        })
    }

    /// Freeze or release this end's outbound direction.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.send_replace(stalled);
    }

    /// Highest `buffered_amount` observed right after a send.
    pub fn peak_buffered(&self) -> u64 {
        self.peak_buffered.load(Ordering::Relaxed)
    }
}

async fn pump(
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    deliver: mpsc::UnboundedSender<ChannelEvent>,
    buffered: Arc<AtomicU64>,
    mut stalled: watch::Receiver<bool>,
    delay: Duration,
    link: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            _ = link.cancelled() => break,
            next = outbound.recv() => match next {
                Some(payload) => payload,
                None => break,
            },
        };

        let released = tokio::select! {
            _ = link.cancelled() => false,
            res = stalled.wait_for(|stalled| !*stalled) => res.is_ok(),
        };
        if !released {
            break;
        }

        if !delay.is_zero() {
            tokio::select! {
                _ = link.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        buffered.fetch_sub(payload.len() as u64, Ordering::AcqRel);
        if deliver.send(ChannelEvent::Message(payload)).is_err() {
            break;
        }
    }

    link.cancel();
    let _ = deliver.send(ChannelEvent::Closed);
}

#[async_trait]
impl PeerChannel for MemoryChannel {
    async fn send(&self, payload: Bytes) -> Result<(), ChannelError> {
        if self.link.is_cancelled() {
            return Err(ChannelError::Closed);
        }

        let len = payload.len() as u64;
        let now = self.buffered.fetch_add(len, Ordering::AcqRel) + len;
        self.peak_buffered.fetch_max(now, Ordering::Relaxed);

        if self.outbound.send(payload).is_err() {
            self.buffered.fetch_sub(len, Ordering::AcqRel);
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    fn buffered_amount(&self) -> u64 {
        self.buffered.load(Ordering::Acquire)
    }

    fn is_open(&self) -> bool {
        !self.link.is_cancelled()
    }

    fn close(&self) {
        self.link.cancel();
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.link.cancel();
    }
}
