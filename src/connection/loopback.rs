//! In-process negotiator that pairs an offerer and answerer over memory
//! channels. Descriptors carry a session id resolved through a shared
//! [`LoopbackNetwork`].

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::negotiator::{
    Connectivity, DescriptorKind, NegotiationSignal, Negotiator, NegotiatorFactory,
    SessionDescription,
};
use crate::channel::{ChannelEndpoint, LinkProfile, MemoryChannel, MemoryEndpoint, PeerChannel};
use crate::common::EstablishError;

const SESSION_ATTR: &str = "a=loopback-session:";

/// Which readiness signals a negotiator emits once connected.
#[derive(Debug, Clone, Copy)]
pub struct LoopbackOptions {
    pub emit_ready_event: bool,
    pub emit_connectivity: bool,
    /// Negotiate descriptors but never report readiness.
    pub never_connect: bool,
    pub link: LinkProfile,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            emit_ready_event: true,
            emit_connectivity: true,
            never_connect: false,
            link: LinkProfile::default(),
        }
    }
}

struct PendingSession {
    answer_end: Option<MemoryEndpoint>,
    answerer_signals: Option<mpsc::UnboundedSender<NegotiationSignal>>,
}

/// Registry of offers waiting for an answerer.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    sessions: Arc<DashMap<String, PendingSession>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.sessions.len()
    }

    pub fn factory(&self, options: LoopbackOptions) -> LoopbackFactory {
        LoopbackFactory {
            network: self.clone(),
            options,
        }
    }
}

pub struct LoopbackFactory {
    network: LoopbackNetwork,
    options: LoopbackOptions,
}

impl NegotiatorFactory for LoopbackFactory {
    fn create(&self) -> Box<dyn Negotiator> {
        Box::new(LoopbackNegotiator::new(self.network.clone(), self.options))
    }
}

pub struct LoopbackNegotiator {
    network: LoopbackNetwork,
    options: LoopbackOptions,
    session_id: Mutex<Option<String>>,
    signals_tx: mpsc::UnboundedSender<NegotiationSignal>,
    signals_rx: Mutex<Option<mpsc::UnboundedReceiver<NegotiationSignal>>>,
    endpoint: Mutex<Option<MemoryEndpoint>>,
    channel: Mutex<Option<Arc<MemoryChannel>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn session_sdp(id: &str) -> String {
    format!("v=0\r\no=codedrop-loopback 0 0 IN IP4 127.0.0.1\r\n{SESSION_ATTR}{id}\r\n")
}

fn session_id_from(description: &SessionDescription) -> Result<String, EstablishError> {
    description
        .sdp
        .lines()
        .find_map(|line| line.strip_prefix(SESSION_ATTR))
        .map(|id| id.trim().to_string())
        .ok_or_else(|| EstablishError::Negotiation("descriptor has no loopback session".into()))
}

impl LoopbackNegotiator {
    pub fn new(network: LoopbackNetwork, options: LoopbackOptions) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        Self {
            network,
            options,
            session_id: Mutex::new(None),
            signals_tx,
            signals_rx: Mutex::new(Some(signals_rx)),
            endpoint: Mutex::new(None),
            channel: Mutex::new(None),
        }
    }

    fn hold(&self, end: MemoryEndpoint) {
        *lock(&self.channel) = Some(end.channel.clone());
        *lock(&self.endpoint) = Some(end);
    }

    fn announce(&self, signals: &mpsc::UnboundedSender<NegotiationSignal>) {
        if self.options.emit_connectivity {
            let _ = signals.send(NegotiationSignal::Connectivity(Connectivity::Checking));
            let _ = signals.send(NegotiationSignal::Connectivity(Connectivity::Connected));
        }
        if self.options.emit_ready_event {
            let _ = signals.send(NegotiationSignal::Ready);
        }
    }
}

#[async_trait]
impl Negotiator for LoopbackNegotiator {
    async fn create_offer(&self) -> Result<SessionDescription, EstablishError> {
        let id = Uuid::new_v4().to_string();
        let (offer_end, answer_end) = MemoryChannel::pair(self.options.link);
        self.hold(offer_end);
        self.network.sessions.insert(
            id.clone(),
            PendingSession {
                answer_end: Some(answer_end),
                answerer_signals: None,
            },
        );
        *lock(&self.session_id) = Some(id.clone());
        Ok(SessionDescription::offer(session_sdp(&id)))
    }

    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, EstablishError> {
        if offer.kind != DescriptorKind::Offer {
            return Err(EstablishError::DescriptorParse("expected an offer".into()));
        }
        let id = session_id_from(&offer)?;
        let answer_end = {
            let mut session = self
                .network
                .sessions
                .get_mut(&id)
                .ok_or_else(|| EstablishError::Negotiation(format!("unknown session {id}")))?;
            session.answerer_signals = Some(self.signals_tx.clone());
            session.answer_end.take()
        }
        .ok_or_else(|| EstablishError::Negotiation(format!("session {id} already answered")))?;

        self.hold(answer_end);
        *lock(&self.session_id) = Some(id.clone());
        Ok(SessionDescription::answer(session_sdp(&id)))
    }

    async fn apply_answer(&self, answer: SessionDescription) -> Result<(), EstablishError> {
        let id = session_id_from(&answer)?;
        if lock(&self.session_id).as_deref() != Some(id.as_str()) {
            return Err(EstablishError::Negotiation(format!(
                "answer for foreign session {id}"
            )));
        }
        let (_, session) = self
            .network
            .sessions
            .remove(&id)
            .ok_or_else(|| EstablishError::Negotiation(format!("unknown session {id}")))?;

        if self.options.never_connect {
            return Ok(());
        }
        self.announce(&self.signals_tx);
        if let Some(answerer) = session.answerer_signals {
            self.announce(&answerer);
        }
        Ok(())
    }

    fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<NegotiationSignal>> {
        lock(&self.signals_rx).take()
    }

    fn take_channel(&self) -> Option<ChannelEndpoint> {
        lock(&self.endpoint).take().map(MemoryEndpoint::into_endpoint)
    }

    fn close(&self) {
        if let Some(id) = lock(&self.session_id).take() {
            self.network.sessions.remove(&id);
        }
        if let Some(channel) = lock(&self.channel).take() {
            channel.close();
        }
        lock(&self.endpoint).take();
        let _ = self
            .signals_tx
            .send(NegotiationSignal::Connectivity(Connectivity::Closed));
    }
}
