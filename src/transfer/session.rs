//! Receive loop for one peer link: answers pings, reassembles files, and
//! reports what happened as [`SessionEvent`]s.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::protocol::WireMessage;
use super::receiver::{Reassembler, Reassembly};
use super::storage::ReceivedFile;
use crate::channel::{ChannelEvent, PeerChannel};
use crate::common::ProtocolError;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Progress {
        file_id: String,
        name: String,
        percent: f64,
    },
    FileReceived(ReceivedFile),
    FileFailed {
        file_id: String,
        name: String,
        reason: String,
    },
    /// A `pong` arrived.
    PeerAlive,
    /// The channel closed; no further events follow.
    Closed,
}

pub struct TransferSession {
    channel: Arc<dyn PeerChannel>,
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    reassembler: Reassembler,
    events: mpsc::UnboundedSender<SessionEvent>,
    last_seen: Option<Instant>,
}

impl TransferSession {
    pub fn new(
        channel: Arc<dyn PeerChannel>,
        inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            channel,
            inbound,
            reassembler: Reassembler::new(),
            events,
            last_seen: None,
        };
        (session, events_rx)
    }

    /// Start the receive loop on its own task.
    pub fn spawn(
        channel: Arc<dyn PeerChannel>,
        inbound: mpsc::UnboundedReceiver<ChannelEvent>,
        token: CancellationToken,
    ) -> (JoinHandle<()>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (session, events) = Self::new(channel, inbound);
        (tokio::spawn(session.run(token)), events)
    }

    pub async fn run(mut self, token: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = self.inbound.recv() => event,
            };

            match event {
                Some(ChannelEvent::Message(bytes)) => self.handle(&bytes).await,
                Some(ChannelEvent::Open) => tracing::debug!("Channel open"),
                Some(ChannelEvent::Closed) | None => {
                    tracing::info!(
                        in_flight = self.reassembler.in_flight(),
                        "Channel closed, ending session"
                    );
                    self.emit(SessionEvent::Closed);
                    break;
                }
            }
        }
    }

    async fn handle(&mut self, bytes: &[u8]) {
        let message = match WireMessage::decode(bytes) {
            Ok(message) => message,
            Err(ProtocolError::UnknownMessage(kind)) => {
                tracing::warn!(kind, "Dropping unknown message type");
                return;
            }
            Err(e) => {
                tracing::warn!("Dropping undecodable message: {e}");
                return;
            }
        };

        match message {
            WireMessage::Ping => self.reply_pong().await,
            WireMessage::Pong => {
                let now = Instant::now();
                let gap = self.last_seen.replace(now).map(|previous| now - previous);
                tracing::trace!(?gap, "Pong");
                self.emit(SessionEvent::PeerAlive);
            }
            WireMessage::Metadata(metadata) => {
                let outcome = self.reassembler.on_metadata(metadata);
                self.report(outcome);
            }
            WireMessage::Chunk(chunk) => {
                let outcome = self.reassembler.on_chunk(chunk);
                self.report(outcome);
            }
        }
    }

    async fn reply_pong(&self) {
        if !self.channel.is_open() {
            return;
        }
        match WireMessage::Pong.encode() {
            Ok(pong) => {
                if let Err(e) = self.channel.send(pong).await {
                    tracing::debug!("Failed to answer ping: {e}");
                }
            }
            Err(e) => tracing::error!("Failed to encode pong: {e}"),
        }
    }

    fn report(&self, outcome: Reassembly) {
        match outcome {
            Reassembly::Ignored => {}
            Reassembly::Progress {
                file_id,
                name,
                received,
                total,
            } => self.emit(SessionEvent::Progress {
                file_id,
                name,
                percent: received as f64 / total as f64 * 100.0,
            }),
            Reassembly::Completed(file) => {
                self.emit(SessionEvent::Progress {
                    file_id: file.id.clone(),
                    name: file.name.clone(),
                    percent: 100.0,
                });
                self.emit(SessionEvent::FileReceived(file));
            }
            Reassembly::Failed {
                file_id,
                name,
                reason,
            } => {
                tracing::warn!(file_id = %file_id, name = %name, "File failed: {reason}");
                self.emit(SessionEvent::FileFailed {
                    file_id,
                    name,
                    reason,
                })
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine; the loop still answers pings.
        let _ = self.events.send(event);
    }
}
