//! JSON bodies of the `/signal` API, shared by the server and its clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::common::AppError;

/// `POST /signal` request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Opaque descriptor. Clients normally send a string; any other JSON
    /// value is stored in its serialized form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SignalRequest {
    pub fn new(action: SignalAction, code: &str) -> Self {
        Self {
            action: action.as_str().to_string(),
            code: Some(code.to_string()),
            data: None,
        }
    }

    pub fn with_data(mut self, descriptor: impl Into<String>) -> Self {
        self.data = Some(Value::String(descriptor.into()));
        self
    }

    /// The descriptor carried in `data`, if any.
    pub fn descriptor(&self) -> Option<String> {
        match self.data.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    CreateRoom,
    JoinRoom,
    SendOffer,
    SendAnswer,
    GetAnswer,
    CheckRoom,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::CreateRoom => "create-room",
            SignalAction::JoinRoom => "join-room",
            SignalAction::SendOffer => "send-offer",
            SignalAction::SendAnswer => "send-answer",
            SignalAction::GetAnswer => "get-answer",
            SignalAction::CheckRoom => "check-room",
        }
    }
}

impl FromStr for SignalAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create-room" => Ok(SignalAction::CreateRoom),
            "join-room" => Ok(SignalAction::JoinRoom),
            "send-offer" => Ok(SignalAction::SendOffer),
            "send-answer" => Ok(SignalAction::SendAnswer),
            "get-answer" => Ok(SignalAction::GetAnswer),
            "check-room" => Ok(SignalAction::CheckRoom),
            _ => Err(AppError::InvalidAction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub success: bool,
    pub code: String,
    pub reset: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub success: bool,
    pub offer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

/// `get-answer` reply. `success` is false (with a message) while the
/// answerer has not posted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AnswerResponse {
    pub const NOT_READY: &'static str = "No answer yet";

    pub fn ready(answer: String) -> Self {
        Self {
            success: true,
            answer: Some(answer),
            message: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            success: false,
            answer: None,
            message: Some(Self::NOT_READY.to_string()),
        }
    }
}

/// `check-room` reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub exists: bool,
    pub offerer_connected: bool,
    pub answerer_connected: bool,
    pub has_offer: bool,
    pub has_answer: bool,
}

/// `GET /signal?type=status` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub offerer_connected: bool,
    pub answerer_connected: bool,
    pub has_offer: bool,
    pub has_answer: bool,
}

impl From<RoomStatus> for StatusResponse {
    fn from(status: RoomStatus) -> Self {
        Self {
            offerer_connected: status.offerer_connected,
            answerer_connected: status.answerer_connected,
            has_offer: status.has_offer,
            has_answer: status.has_answer,
        }
    }
}

/// Full copy of a room, `createdAt` in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    pub offer: Option<String>,
    pub answer: Option<String>,
    pub offerer_connected: bool,
    pub answerer_connected: bool,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomResponse {
    pub room: RoomSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
