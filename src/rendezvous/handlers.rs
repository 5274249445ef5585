//! `/signal` handlers.

use anyhow::anyhow;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::code::normalize_code;
use super::messages::{
    AckResponse, AnswerResponse, CreateRoomResponse, JoinRoomResponse, RoomResponse,
    SignalAction, SignalRequest, StatusResponse,
};
use super::state::RendezvousState;
use crate::common::AppError;

fn require_code(raw: Option<&str>) -> Result<String, AppError> {
    let raw = raw.ok_or(AppError::CodeRequired)?;
    if raw.trim().is_empty() {
        return Err(AppError::CodeRequired);
    }
    normalize_code(raw).ok_or(AppError::InvalidCode)
}

pub async fn signal_post(
    State(state): State<RendezvousState>,
    payload: Result<Json<SignalRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::Internal(anyhow!("bad request body: {rejection}")))?;

    let action: SignalAction = request.action.parse()?;
    let code = require_code(request.code.as_deref())?;
    tracing::info!(action = action.as_str(), code = %code, "Signal request");

    let store = &state.store;
    let response = match action {
        SignalAction::CreateRoom => {
            let outcome = store.create_room(&code);
            if outcome.reset {
                tracing::info!(code = %code, "Room reset by creator");
            }
            Json(CreateRoomResponse {
                success: true,
                code,
                reset: outcome.reset,
            })
            .into_response()
        }
        SignalAction::JoinRoom => {
            let offer = store.join_room(&code)?;
            Json(JoinRoomResponse {
                success: true,
                offer,
            })
            .into_response()
        }
        SignalAction::SendOffer => {
            let descriptor = request.descriptor().ok_or(AppError::DescriptorRequired)?;
            store.submit_offer(&code, descriptor)?;
            Json(AckResponse { success: true }).into_response()
        }
        SignalAction::SendAnswer => {
            let descriptor = request.descriptor().ok_or(AppError::DescriptorRequired)?;
            store.submit_answer(&code, descriptor)?;
            Json(AckResponse { success: true }).into_response()
        }
        SignalAction::GetAnswer => match store.get_answer(&code)? {
            Some(answer) => Json(AnswerResponse::ready(answer)).into_response(),
            None => Json(AnswerResponse::pending()).into_response(),
        },
        SignalAction::CheckRoom => Json(store.check_room(&code)).into_response(),
    };

    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct SignalQuery {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Read-only room view: flags with `type=status`, otherwise the full room.
pub async fn signal_get(
    State(state): State<RendezvousState>,
    Query(query): Query<SignalQuery>,
) -> Result<Response, AppError> {
    let code = require_code(query.code.as_deref())?;
    let snapshot = state.store.snapshot(&code).ok_or(AppError::RoomNotFound)?;

    if query.kind.as_deref() == Some("status") {
        let status = StatusResponse {
            offerer_connected: snapshot.offerer_connected,
            answerer_connected: snapshot.answerer_connected,
            has_offer: snapshot.offer.is_some(),
            has_answer: snapshot.answer.is_some(),
        };
        return Ok(Json(status).into_response());
    }

    Ok(Json(RoomResponse { room: snapshot }).into_response())
}
