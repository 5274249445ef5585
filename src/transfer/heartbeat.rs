//! Keep-alive pings.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::protocol::WireMessage;
use crate::channel::PeerChannel;

/// Send `ping` every `every` while the channel stays open.
pub fn spawn_heartbeat(
    channel: Arc<dyn PeerChannel>,
    every: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if !channel.is_open() {
                        break;
                    }
                    let ping = match WireMessage::Ping.encode() {
                        Ok(ping) => ping,
                        Err(e) => {
                            tracing::error!("Failed to encode ping: {e}");
                            break;
                        }
                    };
                    if let Err(e) = channel.send(ping).await {
                        tracing::debug!("Keep-alive ping failed: {e}");
                        break;
                    }
                }
            }
        }

        tracing::debug!("Heartbeat stopped");
    })
}
