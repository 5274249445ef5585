use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::SignalingClient;
use crate::common::SignalError;
use crate::rendezvous::messages::{
    AckResponse, AnswerResponse, CreateRoomResponse, ErrorResponse, JoinRoomResponse,
    RoomResponse,
};
use crate::rendezvous::{RoomSnapshot, RoomStatus, SignalAction, SignalRequest};

/// Rendezvous client over HTTP.
#[derive(Clone)]
pub struct HttpSignalingClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSignalingClient {
    /// `base_url` is the service root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/signal", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<T: DeserializeOwned>(&self, request: &SignalRequest) -> Result<T, SignalError> {
        tracing::debug!(action = %request.action, "POST {}", self.endpoint);
        let response = self.http.post(&self.endpoint).json(request).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SignalError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(SignalError::RoomNotFound);
    }
    if !status.is_success() {
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        return Err(SignalError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SignalError::Decode(e.to_string()))
}

#[async_trait]
impl SignalingClient for HttpSignalingClient {
    async fn create_room(&self, code: &str) -> Result<bool, SignalError> {
        let body: CreateRoomResponse = self
            .post(&SignalRequest::new(SignalAction::CreateRoom, code))
            .await?;
        Ok(body.reset)
    }

    async fn join_room(&self, code: &str) -> Result<Option<String>, SignalError> {
        let body: JoinRoomResponse = self
            .post(&SignalRequest::new(SignalAction::JoinRoom, code))
            .await?;
        Ok(body.offer)
    }

    async fn submit_offer(&self, code: &str, descriptor: &str) -> Result<(), SignalError> {
        let _: AckResponse = self
            .post(&SignalRequest::new(SignalAction::SendOffer, code).with_data(descriptor))
            .await?;
        Ok(())
    }

    async fn submit_answer(&self, code: &str, descriptor: &str) -> Result<(), SignalError> {
        let _: AckResponse = self
            .post(&SignalRequest::new(SignalAction::SendAnswer, code).with_data(descriptor))
            .await?;
        Ok(())
    }

    async fn get_answer(&self, code: &str) -> Result<Option<String>, SignalError> {
        let body: AnswerResponse = self
            .post(&SignalRequest::new(SignalAction::GetAnswer, code))
            .await?;
        Ok(if body.success { body.answer } else { None })
    }

    async fn check_room(&self, code: &str) -> Result<RoomStatus, SignalError> {
        self.post(&SignalRequest::new(SignalAction::CheckRoom, code))
            .await
    }

    async fn fetch_room(&self, code: &str) -> Result<RoomSnapshot, SignalError> {
        tracing::debug!(code, "GET {}", self.endpoint);
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("code", code)])
            .send()
            .await?;
        let body: RoomResponse = decode(response).await?;
        Ok(body.room)
    }
}
