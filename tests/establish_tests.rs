mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use codedrop::channel::ChannelEvent;
use codedrop::common::{EstablishError, EstablishSettings};
use codedrop::connection::{
    ConnectionEstablisher, ConnectionState, Establishment, LoopbackNetwork, LoopbackOptions,
};
use common::{connect_pair, establisher_pair, local_signaling, next_channel_event};

fn default_pair(
    options: LoopbackOptions,
) -> (
    Arc<codedrop::rendezvous::RoomStore>,
    Arc<dyn codedrop::signaling::SignalingClient>,
    common::EstablisherPair,
) {
    let (store, signaling) = local_signaling();
    let pair = establisher_pair(signaling.clone(), options, EstablishSettings::default());
    (store, signaling, pair)
}

//===============
// Happy path
//===============
#[tokio::test(start_paused = true)]
async fn offerer_and_answerer_connect() {
    common::init_test_tracing();
    let (store, _signaling, pair) = default_pair(LoopbackOptions::default());

    let (mut send, mut recv) = connect_pair(&pair, "AB12").await;

    assert_eq!(pair.offerer.state(), ConnectionState::Connected);
    assert_eq!(pair.answerer.state(), ConnectionState::Connected);
    assert!(send.is_connected());
    assert!(recv.is_connected());
    assert_eq!(pair.network.pending(), 0);

    let status = store.check_room("AB12");
    assert!(status.has_offer && status.has_answer && status.answerer_connected);

    send.channel
        .send(bytes::Bytes::from_static(b"hello"))
        .await
        .expect("send");
    assert_eq!(
        next_channel_event(&mut recv.events).await,
        Some(ChannelEvent::Message(bytes::Bytes::from_static(b"hello")))
    );

    recv.channel
        .send(bytes::Bytes::from_static(b"back"))
        .await
        .expect("send");
    assert_eq!(
        next_channel_event(&mut send.events).await,
        Some(ChannelEvent::Message(bytes::Bytes::from_static(b"back")))
    );
}

#[tokio::test(start_paused = true)]
async fn ready_event_alone_is_enough() {
    let (_store, _signaling, pair) = default_pair(LoopbackOptions {
        emit_connectivity: false,
        ..LoopbackOptions::default()
    });
    connect_pair(&pair, "READY1").await;
    assert_eq!(pair.offerer.state(), ConnectionState::Connected);
    assert_eq!(pair.answerer.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn connectivity_alone_is_enough() {
    let (_store, _signaling, pair) = default_pair(LoopbackOptions {
        emit_ready_event: false,
        ..LoopbackOptions::default()
    });
    connect_pair(&pair, "ICE1").await;
    assert_eq!(pair.offerer.state(), ConnectionState::Connected);
    assert_eq!(pair.answerer.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn answerer_waits_for_a_late_offer() {
    let (_store, signaling, pair) = default_pair(LoopbackOptions::default());
    signaling.create_room("LATE1").await.expect("create room");

    let offer_side = async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        pair.offerer.start_offer("LATE1").await
    };
    let (answered, offered) = tokio::join!(pair.answerer.start_answer("LATE1"), offer_side);

    assert!(matches!(answered, Ok(Establishment::Connected(_))));
    assert!(matches!(offered, Ok(Establishment::Connected(_))));
}

//===============
// Re-invocation
//===============
#[tokio::test(start_paused = true)]
async fn second_start_while_connected_is_a_no_op() {
    let (store, _signaling, pair) = default_pair(LoopbackOptions::default());
    let (_send, _recv) = connect_pair(&pair, "ONCE").await;

    let again = pair.offerer.start_offer("ONCE").await.expect("no-op");
    assert!(matches!(again, Establishment::AlreadyConnected));
    assert!(again.into_link().is_none());
    assert_eq!(pair.offerer.state(), ConnectionState::Connected);

    // The room was not reset.
    let status = store.check_room("ONCE");
    assert!(status.has_answer);
}

#[tokio::test(start_paused = true)]
async fn new_attempt_cancels_the_previous_one() {
    let (_store, signaling) = local_signaling();
    let network = LoopbackNetwork::new();
    let establisher = Arc::new(ConnectionEstablisher::new(
        signaling,
        Arc::new(network.factory(LoopbackOptions::default())),
        EstablishSettings::default(),
    ));

    let first = {
        let establisher = establisher.clone();
        tokio::spawn(async move { establisher.start_offer("SLOW").await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;

    let second = {
        let establisher = establisher.clone();
        tokio::spawn(async move { establisher.start_offer("SLOW").await })
    };

    let first = first.await.expect("first task");
    assert!(matches!(first, Err(EstablishError::Cancelled)));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(establisher.state(), ConnectionState::AwaitingAnswer);
    assert_eq!(network.pending(), 1, "only the live attempt keeps a session");

    establisher.close();
    let second = second.await.expect("second task");
    assert!(matches!(second, Err(EstablishError::Cancelled)));
    assert_eq!(establisher.state(), ConnectionState::Idle);
}

//===============
// Failures
//===============
#[tokio::test(start_paused = true)]
async fn answerer_without_room_fails_fast() {
    let (_store, _signaling, pair) = default_pair(LoopbackOptions::default());
    let started = Instant::now();

    let err = pair.answerer.start_answer("NOROOM").await.err().expect("error");

    assert!(matches!(err, EstablishError::RoomNotFound));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(pair.answerer.state(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn offerer_times_out_without_answer() {
    let (_store, _signaling, pair) = default_pair(LoopbackOptions::default());
    let started = Instant::now();

    let err = pair.offerer.start_offer("ALONE").await.err().expect("error");

    assert!(matches!(
        err,
        EstablishError::Timeout {
            stage: "waiting for an answer"
        }
    ));
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(pair.offerer.state(), ConnectionState::Failed);
    assert_eq!(pair.network.pending(), 0, "failed attempt releases its session");
}

#[tokio::test(start_paused = true)]
async fn answerer_times_out_without_offer() {
    let (_store, signaling, pair) = default_pair(LoopbackOptions::default());
    signaling.create_room("EMPTY").await.expect("create room");

    let err = pair.answerer.start_answer("EMPTY").await.err().expect("error");
    assert!(matches!(
        err,
        EstablishError::Timeout {
            stage: "waiting for an offer"
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn malformed_offer_is_a_descriptor_error() {
    let (_store, signaling, pair) = default_pair(LoopbackOptions::default());
    signaling.create_room("BAD1").await.expect("create room");
    signaling
        .submit_offer("BAD1", "{not a descriptor")
        .await
        .expect("submit");

    let err = pair.answerer.start_answer("BAD1").await.err().expect("error");
    assert!(matches!(err, EstablishError::DescriptorParse(_)));
    assert_eq!(pair.answerer.state(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn malformed_answer_is_a_descriptor_error() {
    let (_store, signaling, pair) = default_pair(LoopbackOptions::default());

    let bad_answer = async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        signaling
            .submit_answer("BAD2", r#"{"type":"offer","sdp":"v=0"}"#)
            .await
    };
    let (offered, submitted) = tokio::join!(pair.offerer.start_offer("BAD2"), bad_answer);

    submitted.expect("submit");
    assert!(matches!(offered, Err(EstablishError::DescriptorParse(_))));
}

#[tokio::test(start_paused = true)]
async fn missing_readiness_times_out() {
    let (_store, _signaling, pair) = default_pair(LoopbackOptions {
        never_connect: true,
        ..LoopbackOptions::default()
    });

    let answer_side = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        pair.answerer.start_answer("MUTE").await
    };
    let (offered, answered) = tokio::join!(pair.offerer.start_offer("MUTE"), answer_side);

    for result in [offered, answered] {
        assert!(matches!(
            result,
            Err(EstablishError::Timeout {
                stage: "waiting for the peer connection"
            })
        ));
    }
}

//===============
// Disconnect
//===============
#[tokio::test(start_paused = true)]
async fn closed_channel_demotes_both_sides() {
    let (_store, _signaling, pair) = default_pair(LoopbackOptions::default());
    let (mut send, recv) = connect_pair(&pair, "DROP").await;

    recv.channel.close();

    let mut offerer_state = pair.offerer.subscribe();
    offerer_state
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await
        .expect("offerer demoted");
    let mut answerer_state = pair.answerer.subscribe();
    answerer_state
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await
        .expect("answerer demoted");

    assert_eq!(next_channel_event(&mut send.events).await, Some(ChannelEvent::Closed));
    assert!(!send.is_connected());
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_disconnect() {
    let (_store, _signaling, pair) = default_pair(LoopbackOptions::default());
    let (_send, recv) = connect_pair(&pair, "AGAIN").await;

    recv.channel.close();
    pair.offerer
        .subscribe()
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await
        .expect("demoted");
    pair.answerer
        .subscribe()
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await
        .expect("demoted");

    let (send, recv) = connect_pair(&pair, "AGAIN").await;
    assert!(send.is_connected());
    assert!(recv.is_connected());
}
