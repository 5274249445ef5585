//! End-to-end drop inside one process: a real rendezvous server on loopback,
//! HTTP signaling, loopback negotiation, and the transfer stack on both ends.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{AppConfig, RetryPolicy};
use crate::connection::{ConnectionEstablisher, LoopbackNetwork, LoopbackOptions, PeerLink};
use crate::orchestrator::{BatchReport, TransferOrchestrator};
use crate::rendezvous::{generate_share_code, DEFAULT_CODE_LENGTH};
use crate::server::RendezvousServer;
use crate::signaling::{HttpSignalingClient, SignalingClient};
use crate::transfer::{spawn_heartbeat, OutgoingFile, SessionEvent, TransferSession};

/// How long the receiver may lag behind the last queued chunk.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct DropSummary {
    pub code: String,
    pub report: BatchReport,
    pub saved: Vec<PathBuf>,
    /// `(name, reason)` for files the receiver rejected.
    pub rejected: Vec<(String, String)>,
}

/// Send `files` from an in-process offerer to an in-process answerer that
/// saves them under `out_dir`.
pub async fn run_loopback_drop(
    config: &AppConfig,
    files: Vec<OutgoingFile>,
    out_dir: &Path,
) -> Result<DropSummary> {
    let mut server_config = config.clone();
    server_config.server.host = "127.0.0.1".into();
    server_config.server.port = 0;
    let server = RendezvousServer::start(&server_config).await?;
    let base_url = server.base_url();

    let result = drop_through(config, &base_url, files, out_dir).await;
    server.shutdown().await?;
    result
}

async fn drop_through(
    config: &AppConfig,
    base_url: &str,
    files: Vec<OutgoingFile>,
    out_dir: &Path,
) -> Result<DropSummary> {
    let signaling: Arc<dyn SignalingClient> = Arc::new(HttpSignalingClient::new(base_url));
    let factory = Arc::new(LoopbackNetwork::new().factory(LoopbackOptions::default()));
    let offerer = ConnectionEstablisher::new(signaling.clone(), factory.clone(), config.establish);
    let answerer = ConnectionEstablisher::new(signaling.clone(), factory, config.establish);

    let code = generate_share_code(DEFAULT_CODE_LENGTH);
    tracing::info!(code = %code, "Share code");

    let answer_side = async {
        wait_for_room(signaling.as_ref(), &code).await?;
        answerer.start_answer(&code).await.context("Answerer failed")
    };
    let (offered, answered) = tokio::join!(offerer.start_offer(&code), answer_side);

    let send_link = offered
        .context("Offerer failed")?
        .into_link()
        .context("Offerer was already connected")?;
    let recv_link = answered?
        .into_link()
        .context("Answerer was already connected")?;

    let token = CancellationToken::new();
    let summary = transfer(config, code, send_link, recv_link, files, out_dir, &token).await;

    token.cancel();
    offerer.close();
    answerer.close();
    summary
}

async fn wait_for_room(signaling: &dyn SignalingClient, code: &str) -> Result<()> {
    let found = RetryPolicy::fixed(50, Duration::from_millis(20))
        .poll(|| async {
            let status = signaling.check_room(code).await?;
            Ok::<_, crate::common::SignalError>(status.exists.then_some(()))
        })
        .await?;
    if found.is_none() {
        bail!("Room {code} never appeared");
    }
    Ok(())
}

async fn transfer(
    config: &AppConfig,
    code: String,
    send_link: PeerLink,
    recv_link: PeerLink,
    files: Vec<OutgoingFile>,
    out_dir: &Path,
    token: &CancellationToken,
) -> Result<DropSummary> {
    let heartbeat = config.transfer.heartbeat_interval();
    spawn_heartbeat(send_link.channel.clone(), heartbeat, token.child_token());
    spawn_heartbeat(recv_link.channel.clone(), heartbeat, token.child_token());

    let orchestrator = TransferOrchestrator::for_link(&send_link, config.transfer)
        .with_cancellation(token.child_token());
    let PeerLink {
        channel: send_channel,
        events: send_events,
        ..
    } = send_link;
    let (_sender_session, _sender_events) =
        TransferSession::spawn(send_channel, send_events, token.child_token());
    let (_receiver_session, mut received) =
        TransferSession::spawn(recv_link.channel.clone(), recv_link.events, token.child_token());

    let report = orchestrator.send_batch(files).await;

    let mut saved = Vec::new();
    let mut rejected = Vec::new();
    let collect = collect_received(&mut received, report.completed, out_dir, &mut saved, &mut rejected);
    tokio::time::timeout(DRAIN_TIMEOUT, collect)
        .await
        .context("Timed out waiting for the receiver")??;

    Ok(DropSummary {
        code,
        report,
        saved,
        rejected,
    })
}

async fn collect_received(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    expected: usize,
    out_dir: &Path,
    saved: &mut Vec<PathBuf>,
    rejected: &mut Vec<(String, String)>,
) -> Result<()> {
    while saved.len() + rejected.len() < expected {
        match events.recv().await {
            Some(SessionEvent::FileReceived(file)) => match file.save_into(out_dir).await {
                Ok(path) => saved.push(path),
                Err(e) => {
                    tracing::warn!(name = %file.name, "Refusing to save received file: {e:#}");
                    rejected.push((file.name, format!("{e:#}")));
                }
            },
            Some(SessionEvent::FileFailed { name, reason, .. }) => rejected.push((name, reason)),
            Some(SessionEvent::Closed) | None => bail!("Receiver closed early"),
            Some(_) => {}
        }
    }
    Ok(())
}
