//! Offer/answer handshake through the rendezvous service.

pub mod establisher;
pub mod loopback;
pub mod negotiator;
pub mod readiness;

pub use establisher::{ConnectionEstablisher, ConnectionState, Establishment, PeerLink, Role};
pub use loopback::{LoopbackFactory, LoopbackNegotiator, LoopbackNetwork, LoopbackOptions};
pub use negotiator::{
    Connectivity, DescriptorKind, NegotiationSignal, Negotiator, NegotiatorFactory,
    SessionDescription,
};
pub use readiness::{Readiness, ReadinessChange, ReadinessTracker};
