mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use codedrop::rendezvous::spawn_sweeper;
use common::signal_http::{create_test_app, get, post_signal};

const SWEEP_EVERY: Duration = Duration::from_secs(5 * 60);

#[tokio::test(start_paused = true)]
async fn room_is_gone_after_ttl_and_sweep() {
    let (app, store) = create_test_app();
    let token = CancellationToken::new();
    let sweeper = spawn_sweeper(store.clone(), SWEEP_EVERY, token.clone());

    post_signal(&app, json!({ "action": "create-room", "code": "AB12" })).await;

    tokio::time::sleep(Duration::from_secs(9 * 60)).await;
    let (_, body) = post_signal(&app, json!({ "action": "check-room", "code": "AB12" })).await;
    assert_eq!(body["exists"], true);

    tokio::time::sleep(Duration::from_secs(7 * 60)).await;
    assert_eq!(store.len(), 0, "the 15 min sweep should have evicted the room");

    let (_, body) = post_signal(&app, json!({ "action": "check-room", "code": "AB12" })).await;
    assert_eq!(body["exists"], false);

    token.cancel();
    sweeper.await.expect("sweeper stops");
}

#[tokio::test(start_paused = true)]
async fn expired_room_is_not_found_before_any_sweep() {
    let (app, _store) = create_test_app();
    post_signal(&app, json!({ "action": "create-room", "code": "LATE" })).await;

    tokio::time::sleep(Duration::from_secs(10 * 60 + 1)).await;

    let (status, _) = post_signal(&app, json!({ "action": "join-room", "code": "LATE" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, "/signal?code=LATE&type=status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn recreating_an_expired_room_is_not_a_reset() {
    let (app, _store) = create_test_app();
    post_signal(&app, json!({ "action": "create-room", "code": "AGAIN" })).await;

    tokio::time::sleep(Duration::from_secs(11 * 60)).await;

    let (_, body) = post_signal(&app, json!({ "action": "create-room", "code": "AGAIN" })).await;
    assert_eq!(body["reset"], false);
    let (_, body) = post_signal(&app, json!({ "action": "check-room", "code": "AGAIN" })).await;
    assert_eq!(body["exists"], true);
}

#[tokio::test(start_paused = true)]
async fn reset_restarts_the_room_clock() {
    let (app, _store) = create_test_app();
    post_signal(&app, json!({ "action": "create-room", "code": "FRESH" })).await;

    tokio::time::sleep(Duration::from_secs(8 * 60)).await;
    let (_, body) = post_signal(&app, json!({ "action": "create-room", "code": "FRESH" })).await;
    assert_eq!(body["reset"], true);

    tokio::time::sleep(Duration::from_secs(8 * 60)).await;
    let (status, _) = post_signal(&app, json!({ "action": "join-room", "code": "FRESH" })).await;
    assert_eq!(status, StatusCode::OK);
}
