//! Thin proxies to the messaging gateway. Upstream bodies and status
//! codes are relayed verbatim; the console owns no gateway state beyond
//! the bearer token the UI carries.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::gateway::{GatewayReply, MessagingGateway};
use crate::server::{AppState, errors::ApiError};

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub token: String,
    pub phone: String,
    pub message: String,
}

fn gateway(state: &AppState) -> Result<&Arc<MessagingGateway>, ApiError> {
    state
        .gateway
        .as_ref()
        .ok_or(ApiError::Unconfigured("messaging gateway"))
}

fn relay(reply: GatewayReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(reply.body)).into_response()
}

pub async fn generate_token(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(relay(gateway(&state)?.generate_token().await?))
}

pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<TokenBody>,
) -> Result<Response, ApiError> {
    Ok(relay(gateway(&state)?.start_session(&body.token).await?))
}

pub async fn session_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::BadRequest("bearer token required".to_owned()))?;
    Ok(relay(gateway(&state)?.session_status(token).await?))
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<MessageBody>,
) -> Result<Response, ApiError> {
    Ok(relay(
        gateway(&state)?
            .send_message(&body.token, &body.phone, &body.message)
            .await?,
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<TokenBody>,
) -> Result<Response, ApiError> {
    Ok(relay(gateway(&state)?.logout(&body.token).await?))
}
