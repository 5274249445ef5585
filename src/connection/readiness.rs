//! Reconciles the two readiness sources into one idempotent transition.

use super::negotiator::{Connectivity, NegotiationSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Connected,
    Disconnected,
}

/// What a signal changed, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessChange {
    None,
    BecameConnected,
    BecameDisconnected,
    /// Connectivity died before the link ever came up.
    FailedBeforeReady,
}

#[derive(Debug)]
pub struct ReadinessTracker {
    state: Readiness,
}

impl Default for ReadinessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessTracker {
    pub fn new() -> Self {
        Self {
            state: Readiness::Pending,
        }
    }

    pub fn state(&self) -> Readiness {
        self.state
    }

    /// Returns `true` only on the first call while pending.
    pub fn mark_connected(&mut self) -> bool {
        if self.state == Readiness::Pending {
            self.state = Readiness::Connected;
            return true;
        }
        false
    }

    /// Returns `true` only when demoting a connected link.
    pub fn mark_disconnected(&mut self) -> bool {
        if self.state == Readiness::Connected {
            self.state = Readiness::Disconnected;
            return true;
        }
        false
    }

    pub fn observe(&mut self, signal: NegotiationSignal) -> ReadinessChange {
        match signal {
            NegotiationSignal::Ready => self.connected_change(),
            NegotiationSignal::Connectivity(c) if c.is_up() => self.connected_change(),
            NegotiationSignal::Connectivity(c) if c.is_down() => match self.state {
                Readiness::Connected => {
                    self.state = Readiness::Disconnected;
                    ReadinessChange::BecameDisconnected
                }
                // A transient disconnect while checking may still recover.
                Readiness::Pending if c != Connectivity::Disconnected => {
                    ReadinessChange::FailedBeforeReady
                }
                _ => ReadinessChange::None,
            },
            NegotiationSignal::Connectivity(_) => ReadinessChange::None,
        }
    }

    fn connected_change(&mut self) -> ReadinessChange {
        if self.mark_connected() {
            ReadinessChange::BecameConnected
        } else {
            ReadinessChange::None
        }
    }
}
