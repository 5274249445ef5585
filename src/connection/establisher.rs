//! Offerer and answerer state machines over a signaling client and a
//! negotiator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::negotiator::{
    DescriptorKind, NegotiationSignal, Negotiator, NegotiatorFactory, SessionDescription,
};
use super::readiness::{ReadinessChange, ReadinessTracker};
use crate::channel::{ChannelEvent, PeerChannel};
use crate::common::{EstablishError, EstablishSettings, SignalError};
use crate::signaling::SignalingClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Answerer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    // Offerer
    CreatingRoom,
    GeneratingDescriptor,
    AwaitingAnswer,
    // Answerer
    CheckingRoom,
    Joining,
    AwaitingOffer,
    GeneratingAnswer,
    Submitting,
    // Both
    AwaitingReady,
    Connected,
    Disconnected,
    Failed,
}

/// A ready channel plus a view of the connection state.
pub struct PeerLink {
    pub channel: Arc<dyn PeerChannel>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    pub state: watch::Receiver<ConnectionState>,
}

impl PeerLink {
    pub fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected && self.channel.is_open()
    }
}

pub enum Establishment {
    Connected(PeerLink),
    /// The establisher was already connected; nothing was done.
    AlreadyConnected,
}

impl Establishment {
    pub fn into_link(self) -> Option<PeerLink> {
        match self {
            Establishment::Connected(link) => Some(link),
            Establishment::AlreadyConnected => None,
        }
    }
}

struct Attempt {
    token: CancellationToken,
    negotiator: Arc<dyn Negotiator>,
}

pub struct ConnectionEstablisher {
    signaling: Arc<dyn SignalingClient>,
    factory: Arc<dyn NegotiatorFactory>,
    settings: EstablishSettings,
    state: Arc<watch::Sender<ConnectionState>>,
    attempt: Mutex<Option<Attempt>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionEstablisher {
    pub fn new(
        signaling: Arc<dyn SignalingClient>,
        factory: Arc<dyn NegotiatorFactory>,
        settings: EstablishSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            signaling,
            factory,
            settings,
            state: Arc::new(state),
            attempt: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Create the room for `code`, publish an offer, and wait for the answerer.
    pub async fn start_offer(&self, code: &str) -> Result<Establishment, EstablishError> {
        self.start(Role::Offerer, code).await
    }

    /// Join the room for `code`, answer its offer, and wait for the link.
    pub async fn start_answer(&self, code: &str) -> Result<Establishment, EstablishError> {
        self.start(Role::Answerer, code).await
    }

    /// Tear down the current attempt or link and return to idle.
    pub fn close(&self) {
        if let Some(attempt) = lock(&self.attempt).take() {
            attempt.token.cancel();
            attempt.negotiator.close();
        }
        self.set_state(ConnectionState::Idle);
    }

    async fn start(&self, role: Role, code: &str) -> Result<Establishment, EstablishError> {
        if self.state() == ConnectionState::Connected {
            tracing::debug!(?role, code, "Already connected, ignoring");
            return Ok(Establishment::AlreadyConnected);
        }

        self.teardown().await;

        let token = CancellationToken::new();
        let negotiator: Arc<dyn Negotiator> = Arc::from(self.factory.create());
        *lock(&self.attempt) = Some(Attempt {
            token: token.clone(),
            negotiator: negotiator.clone(),
        });
        tracing::info!(?role, code, "Starting connection attempt");

        let flow = async {
            match role {
                Role::Offerer => self.run_offerer(code, negotiator.as_ref()).await?,
                Role::Answerer => self.run_answerer(code, negotiator.as_ref()).await?,
            }
            self.await_ready(negotiator.as_ref()).await
        };

        let result = tokio::select! {
            _ = token.cancelled() => Err(EstablishError::Cancelled),
            result = flow => result,
        };

        match result {
            Ok((signals, tracker)) => self.link_up(negotiator.as_ref(), signals, tracker, &token),
            Err(err) => {
                if !token.is_cancelled() {
                    tracing::warn!(?role, code, "Connection attempt failed: {err}");
                    negotiator.close();
                    self.set_state(ConnectionState::Failed);
                }
                Err(err)
            }
        }
    }

    /// Cancel the previous attempt, close its negotiator, and let it settle.
    async fn teardown(&self) {
        let previous = lock(&self.attempt).take();
        if let Some(attempt) = previous {
            attempt.token.cancel();
            attempt.negotiator.close();
            tracing::debug!("Closed previous negotiator");
            tokio::time::sleep(self.settings.settle()).await;
        }
    }

    fn set_state(&self, next: ConnectionState) {
        tracing::debug!(state = ?next, "Connection state");
        self.state.send_replace(next);
    }

    async fn run_offerer(&self, code: &str, negotiator: &dyn Negotiator) -> Result<(), EstablishError> {
        self.set_state(ConnectionState::CreatingRoom);
        let reset = self.signaling.create_room(code).await?;
        tracing::info!(code, reset, "Room created");

        self.set_state(ConnectionState::GeneratingDescriptor);
        let offer = negotiator.create_offer().await?;
        self.signaling.submit_offer(code, &offer.encode()?).await?;

        self.set_state(ConnectionState::AwaitingAnswer);
        let raw = self
            .settings
            .answer_poll()
            .poll(|| self.probe_answer(code))
            .await?
            .ok_or(EstablishError::Timeout {
                stage: "waiting for an answer",
            })?;

        let answer = SessionDescription::parse(&raw, DescriptorKind::Answer)?;
        negotiator.apply_answer(answer).await
    }

    async fn run_answerer(
        &self,
        code: &str,
        negotiator: &dyn Negotiator,
    ) -> Result<(), EstablishError> {
        self.set_state(ConnectionState::CheckingRoom);
        if !self.signaling.check_room(code).await?.exists {
            return Err(EstablishError::RoomNotFound);
        }

        self.set_state(ConnectionState::Joining);
        let raw = match self.signaling.join_room(code).await? {
            Some(offer) => offer,
            None => {
                self.set_state(ConnectionState::AwaitingOffer);
                self.settings
                    .offer_poll()
                    .poll(|| self.probe_offer(code))
                    .await?
                    .ok_or(EstablishError::Timeout {
                        stage: "waiting for an offer",
                    })?
            }
        };

        let offer = SessionDescription::parse(&raw, DescriptorKind::Offer)?;
        self.set_state(ConnectionState::GeneratingAnswer);
        let answer = negotiator.accept_offer(offer).await?;

        self.set_state(ConnectionState::Submitting);
        self.signaling.submit_answer(code, &answer.encode()?).await?;
        Ok(())
    }

    async fn probe_answer(&self, code: &str) -> Result<Option<String>, EstablishError> {
        match self.signaling.get_answer(code).await {
            Ok(answer) => Ok(answer),
            Err(SignalError::Transport(e)) => {
                tracing::warn!(code, "Answer poll failed, retrying: {e}");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn probe_offer(&self, code: &str) -> Result<Option<String>, EstablishError> {
        let status = match self.signaling.check_room(code).await {
            Ok(status) => status,
            Err(SignalError::Transport(e)) => {
                tracing::warn!(code, "Offer poll failed, retrying: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if !status.exists {
            return Err(EstablishError::RoomNotFound);
        }
        if !status.has_offer {
            return Ok(None);
        }
        Ok(self.signaling.fetch_room(code).await?.offer)
    }

    async fn await_ready(
        &self,
        negotiator: &dyn Negotiator,
    ) -> Result<(mpsc::UnboundedReceiver<NegotiationSignal>, ReadinessTracker), EstablishError>
    {
        self.set_state(ConnectionState::AwaitingReady);
        let mut signals = negotiator
            .take_signals()
            .ok_or_else(|| EstablishError::Negotiation("signals already taken".into()))?;
        let mut tracker = ReadinessTracker::new();

        let wait = async {
            while let Some(signal) = signals.recv().await {
                tracing::debug!(?signal, "Negotiation signal");
                match tracker.observe(signal) {
                    ReadinessChange::BecameConnected => return Ok(()),
                    ReadinessChange::FailedBeforeReady => {
                        return Err(EstablishError::Negotiation(format!(
                            "connectivity failed before ready: {signal:?}"
                        )))
                    }
                    _ => {}
                }
            }
            Err(EstablishError::ChannelClosed)
        };

        tokio::time::timeout(self.settings.ready_timeout(), wait)
            .await
            .map_err(|_| EstablishError::Timeout {
                stage: "waiting for the peer connection",
            })??;

        Ok((signals, tracker))
    }

    fn link_up(
        &self,
        negotiator: &dyn Negotiator,
        signals: mpsc::UnboundedReceiver<NegotiationSignal>,
        tracker: ReadinessTracker,
        token: &CancellationToken,
    ) -> Result<Establishment, EstablishError> {
        let endpoint = negotiator
            .take_channel()
            .ok_or_else(|| EstablishError::Negotiation("negotiator produced no channel".into()))?;

        let (forward, events) = mpsc::unbounded_channel();
        self.set_state(ConnectionState::Connected);
        tracing::info!("Peer connected");

        tokio::spawn(monitor(
            signals,
            tracker,
            endpoint.events,
            forward,
            self.state.clone(),
            token.child_token(),
        ));

        Ok(Establishment::Connected(PeerLink {
            channel: endpoint.channel,
            events,
            state: self.state.subscribe(),
        }))
    }
}

/// Forward channel events to the link owner and demote the state when the
/// link drops.
async fn monitor(
    mut signals: mpsc::UnboundedReceiver<NegotiationSignal>,
    mut tracker: ReadinessTracker,
    mut raw: mpsc::UnboundedReceiver<ChannelEvent>,
    forward: mpsc::UnboundedSender<ChannelEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    token: CancellationToken,
) {
    let mut signals_open = true;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => {
                    if tracker.observe(signal) == ReadinessChange::BecameDisconnected {
                        demote(&state, "connectivity lost");
                    }
                }
                None => signals_open = false,
            },
            event = raw.recv() => match event {
                Some(ChannelEvent::Closed) | None => {
                    if tracker.mark_disconnected() {
                        demote(&state, "channel closed");
                    }
                    let _ = forward.send(ChannelEvent::Closed);
                    break;
                }
                Some(event) => {
                    let _ = forward.send(event);
                }
            },
        }
    }
}

fn demote(state: &watch::Sender<ConnectionState>, reason: &str) {
    let changed = state.send_if_modified(|current| {
        if *current == ConnectionState::Connected {
            *current = ConnectionState::Disconnected;
            true
        } else {
            false
        }
    });
    if changed {
        tracing::warn!(reason, "Peer disconnected");
    }
}
