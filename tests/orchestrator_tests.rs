mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use codedrop::channel::{LinkProfile, MemoryChannel, PeerChannel};
use codedrop::common::EstablishSettings;
use codedrop::connection::{ConnectionState, LoopbackOptions};
use codedrop::orchestrator::{TransferOrchestrator, TransferStatus};
use codedrop::transfer::{OutgoingFile, SessionEvent, TransferSession};
use common::channels::{ClosingChannel, RejectingChannel};
use common::{
    connect_pair, establisher_pair, local_signaling, next_outcome, patterned_bytes,
    small_transfer_settings,
};

fn files(names: &[&str], size: usize) -> Vec<OutgoingFile> {
    names
        .iter()
        .map(|name| OutgoingFile::from_bytes(*name, patterned_bytes(size)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn batch_over_established_link() {
    common::init_test_tracing();
    let (_store, signaling) = local_signaling();
    let pair = establisher_pair(signaling, LoopbackOptions::default(), EstablishSettings::default());
    let (send, recv) = connect_pair(&pair, "BATCH1").await;

    let orchestrator = TransferOrchestrator::for_link(&send, small_transfer_settings());
    let (_session, mut received) =
        TransferSession::spawn(recv.channel.clone(), recv.events, CancellationToken::new());

    let batch = files(&["one.bin", "two.bin", "three.bin"], 5000);
    let expected: Vec<_> = batch.iter().map(|f| (f.name.clone(), f.data.clone())).collect();

    let report = orchestrator.send_batch(batch).await;
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 0);
    for transfer in &report.transfers {
        assert_eq!(transfer.status, TransferStatus::Completed);
        assert_eq!(transfer.progress, 100.0);
        assert_eq!(transfer.file_size, 5000);
    }

    for (name, data) in expected {
        match next_outcome(&mut received).await {
            SessionEvent::FileReceived(file) => {
                assert_eq!(file.name, name);
                assert_eq!(file.data, data);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn failed_file_does_not_stop_the_batch() {
    let (a, b) = MemoryChannel::pair(LinkProfile::default());
    let channel: Arc<dyn PeerChannel> = Arc::new(RejectingChannel {
        inner: a.channel.clone(),
        marker: "poison.bin",
    });
    let (_state_tx, state) = watch::channel(ConnectionState::Connected);
    let orchestrator = TransferOrchestrator::new(channel, state, small_transfer_settings());
    let (_session, mut received) =
        TransferSession::spawn(b.channel.clone(), b.events, CancellationToken::new());

    let report = orchestrator
        .send_batch(files(&["first.bin", "poison.bin", "last.bin"], 3000))
        .await;

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.transfers[0].status, TransferStatus::Completed);
    assert_eq!(
        report.transfers[1].status,
        TransferStatus::Failed("peer channel closed".into())
    );
    assert_eq!(report.transfers[2].status, TransferStatus::Completed);

    for name in ["first.bin", "last.bin"] {
        match next_outcome(&mut received).await {
            SessionEvent::FileReceived(file) => assert_eq!(file.name, name),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn disconnect_fails_remaining_files() {
    let (a, _b) = MemoryChannel::pair(LinkProfile::default());
    // One metadata message and one chunk, then the link drops.
    let channel: Arc<dyn PeerChannel> = Arc::new(ClosingChannel::new(a.channel.clone(), 2));
    let (_state_tx, state) = watch::channel(ConnectionState::Connected);
    let orchestrator = TransferOrchestrator::new(channel, state, small_transfer_settings());

    let report = orchestrator
        .send_batch(files(&["a.bin", "b.bin", "c.bin"], 100))
        .await;

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(report.transfers[0].status, TransferStatus::Completed);
    for transfer in &report.transfers[1..] {
        assert_eq!(
            transfer.status,
            TransferStatus::Failed("peer disconnected".into())
        );
        assert_eq!(transfer.progress, 0.0);
    }
}

#[tokio::test(start_paused = true)]
async fn disconnected_state_fails_the_whole_batch() {
    let (a, _b) = MemoryChannel::pair(LinkProfile::default());
    let (state_tx, state) = watch::channel(ConnectionState::Connected);
    let orchestrator =
        TransferOrchestrator::new(a.channel.clone(), state, small_transfer_settings());

    state_tx.send_replace(ConnectionState::Disconnected);
    let report = orchestrator.send_batch(files(&["x.bin", "y.bin"], 10)).await;

    assert_eq!(report.completed, 0);
    assert_eq!(report.failed, 2);
    assert!(orchestrator.tracker().snapshot().is_complete());
}

#[tokio::test(start_paused = true)]
async fn stalled_file_shows_as_paused() {
    let (a, b) = MemoryChannel::pair(LinkProfile {
        stalled: true,
        ..LinkProfile::default()
    });
    let memory = a.channel.clone();
    let (_state_tx, state) = watch::channel(ConnectionState::Connected);
    let orchestrator = Arc::new(TransferOrchestrator::new(
        a.channel.clone(),
        state,
        small_transfer_settings(),
    ));
    let (_session, _received) =
        TransferSession::spawn(b.channel.clone(), b.events, CancellationToken::new());

    let running = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .send_batch(files(&["slow.bin"], 32 * 1024))
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    let snapshot = orchestrator.tracker().snapshot();
    assert_eq!(snapshot.transfers[0].status, TransferStatus::Paused);
    assert!(snapshot.transfers[0].progress < 100.0);

    memory.set_stalled(false);
    let report = running.await.expect("batch task");
    assert_eq!(report.completed, 1);
    assert_eq!(report.transfers[0].status, TransferStatus::Completed);
}
