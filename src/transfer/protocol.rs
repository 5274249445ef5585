//! JSON envelopes exchanged over the peer channel.
//!
//! Every message is `{"type": ..., "data": ...}`; `ping` and `pong` carry no
//! data. Chunk payloads travel as base64 strings.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::ProtocolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub total_chunks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub file_id: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    #[serde(with = "base64_payload")]
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WireMessage {
    Metadata(FileMetadata),
    Chunk(Chunk),
    Ping,
    Pong,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Metadata(_) => "metadata",
            WireMessage::Chunk(_) => "chunk",
            WireMessage::Ping => "ping",
            WireMessage::Pong => "pong",
        }
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(ProtocolError::Encode)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_slice(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        match envelope.kind.as_str() {
            "ping" => Ok(WireMessage::Ping),
            "pong" => Ok(WireMessage::Pong),
            "metadata" => Ok(WireMessage::Metadata(data_of(envelope.data)?)),
            "chunk" => Ok(WireMessage::Chunk(data_of(envelope.data)?)),
            _ => Err(ProtocolError::UnknownMessage(envelope.kind)),
        }
    }
}

fn data_of<T: serde::de::DeserializeOwned>(data: Option<Value>) -> Result<T, ProtocolError> {
    let data = data.ok_or_else(|| ProtocolError::Malformed("missing data".into()))?;
    serde_json::from_value(data).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

mod base64_payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
