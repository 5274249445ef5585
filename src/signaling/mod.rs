//! Typed clients for the rendezvous API.

mod http;
mod local;

use async_trait::async_trait;

use crate::common::SignalError;
use crate::rendezvous::{RoomSnapshot, RoomStatus};

pub use http::HttpSignalingClient;
pub use local::LocalSignaling;

/// The six rendezvous actions plus a full-room fetch.
///
/// Absent rooms surface as [`SignalError::RoomNotFound`]; "nothing posted
/// yet" is `Ok(None)`.
#[async_trait]
pub trait SignalingClient: Send + Sync {
    /// Returns `true` when an existing room was reset.
    async fn create_room(&self, code: &str) -> Result<bool, SignalError>;

    async fn join_room(&self, code: &str) -> Result<Option<String>, SignalError>;

    async fn submit_offer(&self, code: &str, descriptor: &str) -> Result<(), SignalError>;

    async fn submit_answer(&self, code: &str, descriptor: &str) -> Result<(), SignalError>;

    async fn get_answer(&self, code: &str) -> Result<Option<String>, SignalError>;

    async fn check_room(&self, code: &str) -> Result<RoomStatus, SignalError>;

    async fn fetch_room(&self, code: &str) -> Result<RoomSnapshot, SignalError>;
}
