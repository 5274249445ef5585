//! Error taxonomy for the rendezvous API, handshake, and transfer layers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors returned by the rendezvous HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Invalid action")]
    InvalidAction,
    #[error("Code required")]
    CodeRequired,
    #[error("Invalid code")]
    InvalidCode,
    #[error("Descriptor required")]
    DescriptorRequired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RoomNotFound => StatusCode::NOT_FOUND,
            AppError::InvalidAction
            | AppError::CodeRequired
            | AppError::InvalidCode
            | AppError::DescriptorRequired => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(err) => {
                tracing::error!("Signal API error: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RoomError> for AppError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotFound => AppError::RoomNotFound,
        }
    }
}

/// Room store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Expired or never created. Recoverable by re-creating the room.
    #[error("room not found")]
    NotFound,
}

/// Failures talking to the rendezvous service.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("room not found")]
    RoomNotFound,
    #[error("signaling server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("signaling transport failed")]
    Transport(#[from] reqwest::Error),
    #[error("malformed signaling response: {0}")]
    Decode(String),
}

impl From<RoomError> for SignalError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::NotFound => SignalError::RoomNotFound,
        }
    }
}

/// Terminal outcomes of an establishment attempt.
#[derive(Debug, Error)]
pub enum EstablishError {
    /// The counterpart has not created the room, or it expired.
    #[error("share code not found; the sender has not started or the code expired")]
    RoomNotFound,
    #[error("malformed connection descriptor: {0}")]
    DescriptorParse(String),
    #[error("timed out while {stage}")]
    Timeout { stage: &'static str },
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error(transparent)]
    Signaling(SignalError),
    #[error("peer channel closed")]
    ChannelClosed,
    #[error("establishment cancelled")]
    Cancelled,
}

impl From<SignalError> for EstablishError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::RoomNotFound => EstablishError::RoomNotFound,
            other => EstablishError::Signaling(other),
        }
    }
}

/// Failures while sending a single file.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The send buffer stayed above the high-water mark for every retry.
    #[error("channel saturated after {retries} retries")]
    ChannelSaturated { retries: u32 },
    #[error("peer channel closed")]
    ChannelClosed,
    #[error("transfer cancelled")]
    Cancelled,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ChannelError> for TransferError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => TransferError::ChannelClosed,
        }
    }
}

/// Peer channel send failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
}

/// Wire envelope codec failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message type: {0}")]
    UnknownMessage(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("failed to encode message")]
    Encode(#[source] serde_json::Error),
}
