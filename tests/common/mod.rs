#![allow(dead_code)]

pub mod channels;
pub mod config_test_utils;
pub mod signal_http;

use std::sync::Arc;
use tokio::sync::mpsc;

use codedrop::channel::ChannelEvent;
use codedrop::common::{EstablishSettings, TransferSettings};
use codedrop::connection::{
    ConnectionEstablisher, LoopbackNetwork, LoopbackOptions, PeerLink,
};
use codedrop::rendezvous::RoomStore;
use codedrop::signaling::{LocalSignaling, SignalingClient};
use codedrop::transfer::SessionEvent;

pub const ROOM_TTL: std::time::Duration = std::time::Duration::from_secs(10 * 60);

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("codedrop=debug")
        .with_test_writer()
        .try_init();
}

/// Small chunks and a low high-water mark so backpressure kicks in early.
pub fn small_transfer_settings() -> TransferSettings {
    TransferSettings {
        chunk_size: 1024,
        high_water_mark: 8 * 1024,
        batch_threshold: 4 * 1024,
        batch_size: 4,
        send_retries: 50,
        send_retry_interval_ms: 100,
        metadata_settle_ms: 10,
        heartbeat_interval_secs: 10,
        max_batch_pause_ms: 200,
    }
}

pub fn fast_establish_settings() -> EstablishSettings {
    EstablishSettings {
        poll_interval_ms: 50,
        ..EstablishSettings::default()
    }
}

pub fn local_signaling() -> (Arc<RoomStore>, Arc<dyn SignalingClient>) {
    let store = Arc::new(RoomStore::new(ROOM_TTL));
    let signaling: Arc<dyn SignalingClient> = Arc::new(LocalSignaling::new(store.clone()));
    (store, signaling)
}

/// Offerer and answerer sharing one signaling client and loopback network.
pub struct EstablisherPair {
    pub offerer: ConnectionEstablisher,
    pub answerer: ConnectionEstablisher,
    pub network: LoopbackNetwork,
}

pub fn establisher_pair(
    signaling: Arc<dyn SignalingClient>,
    options: LoopbackOptions,
    settings: EstablishSettings,
) -> EstablisherPair {
    let network = LoopbackNetwork::new();
    let factory = Arc::new(network.factory(options));
    EstablisherPair {
        offerer: ConnectionEstablisher::new(signaling.clone(), factory.clone(), settings),
        answerer: ConnectionEstablisher::new(signaling, factory, settings),
        network,
    }
}

/// Run both sides for `code`; the answerer starts once the offerer has
/// (re)created the room and published a fresh offer.
pub async fn connect_pair(pair: &EstablisherPair, code: &str) -> (PeerLink, PeerLink) {
    let answer_side = async {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        pair.answerer.start_answer(code).await
    };
    let (offered, answered) = tokio::join!(pair.offerer.start_offer(code), answer_side);
    let send = offered
        .expect("offerer connects")
        .into_link()
        .expect("fresh link");
    let recv = answered
        .expect("answerer connects")
        .into_link()
        .expect("fresh link");
    (send, recv)
}

/// Next event that is not `Open`.
pub async fn next_channel_event(
    events: &mut mpsc::UnboundedReceiver<ChannelEvent>,
) -> Option<ChannelEvent> {
    loop {
        match events.recv().await {
            Some(ChannelEvent::Open) => continue,
            other => return other,
        }
    }
}

/// Next session event that is not a progress update.
pub async fn next_outcome(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    loop {
        match events.recv().await.expect("session event") {
            SessionEvent::Progress { .. } => continue,
            other => return other,
        }
    }
}

/// Deterministic, non-repeating-ish test payload.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
