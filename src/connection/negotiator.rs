//! The negotiation primitive the establisher drives, and its descriptor format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::channel::ChannelEndpoint;
use crate::common::EstablishError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Offer,
    Answer,
}

/// Connection descriptor exchanged through the rendezvous service as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: DescriptorKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptorKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptorKind::Answer,
            sdp: sdp.into(),
        }
    }

    pub fn encode(&self) -> Result<String, EstablishError> {
        serde_json::to_string(self).map_err(|e| EstablishError::Negotiation(e.to_string()))
    }

    /// Parse a remote descriptor, rejecting one of the wrong kind.
    pub fn parse(raw: &str, expected: DescriptorKind) -> Result<Self, EstablishError> {
        let description: Self = serde_json::from_str(raw)
            .map_err(|e| EstablishError::DescriptorParse(e.to_string()))?;
        if description.kind != expected {
            return Err(EstablishError::DescriptorParse(format!(
                "expected {expected:?} descriptor, got {:?}",
                description.kind
            )));
        }
        Ok(description)
    }
}

/// ICE-style connectivity states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl Connectivity {
    pub fn is_up(self) -> bool {
        matches!(self, Connectivity::Connected | Connectivity::Completed)
    }

    pub fn is_down(self) -> bool {
        matches!(
            self,
            Connectivity::Disconnected | Connectivity::Failed | Connectivity::Closed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationSignal {
    /// The data path is usable.
    Ready,
    Connectivity(Connectivity),
}

/// One negotiation attempt. Instances are single-use.
#[async_trait]
pub trait Negotiator: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EstablishError>;

    async fn accept_offer(
        &self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, EstablishError>;

    async fn apply_answer(&self, answer: SessionDescription) -> Result<(), EstablishError>;

    /// Readiness and connectivity signals. Available once.
    fn take_signals(&self) -> Option<mpsc::UnboundedReceiver<NegotiationSignal>>;

    /// The negotiated channel. Available once, after negotiation.
    fn take_channel(&self) -> Option<ChannelEndpoint>;

    /// Tear down synchronously. Safe to call more than once.
    fn close(&self);
}

pub trait NegotiatorFactory: Send + Sync {
    fn create(&self) -> Box<dyn Negotiator>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_json_shape() {
        let json = SessionDescription::offer("v=0").encode().unwrap();
        assert_eq!(json, r#"{"type":"offer","sdp":"v=0"}"#);
    }

    #[test]
    fn rejects_garbage_and_wrong_kind() {
        assert!(matches!(
            SessionDescription::parse("not json", DescriptorKind::Answer),
            Err(EstablishError::DescriptorParse(_))
        ));
        let offer = SessionDescription::offer("v=0").encode().unwrap();
        assert!(matches!(
            SessionDescription::parse(&offer, DescriptorKind::Answer),
            Err(EstablishError::DescriptorParse(_))
        ));
    }
}
