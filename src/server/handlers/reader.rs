//! Transport selection and BLE session lifecycle.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::reader::TransportMode;
use crate::reader::local::LocalStatus;
use crate::server::{AppState, errors::ApiError};

#[derive(Debug, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: TransportMode,
}

pub async fn get_mode(State(state): State<AppState>) -> Json<ModeBody> {
    Json(ModeBody {
        mode: state.tap.mode(),
    })
}

/// Persists the operator's transport choice. Refused with a conflict
/// while a card operation is outstanding.
pub async fn set_mode(
    State(state): State<AppState>,
    Json(body): Json<ModeBody>,
) -> Result<Json<ModeBody>, ApiError> {
    state.tap.set_mode(body.mode).await?;
    Ok(Json(ModeBody { mode: body.mode }))
}

pub async fn local_status(
    State(state): State<AppState>,
) -> Result<Json<LocalStatus>, ApiError> {
    Ok(Json(state.tap.local_status().await?))
}

/// Explicit pairing action; scans for the bridge and opens the session.
pub async fn ble_connect(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let device = state.tap.connect_ble().await?;
    Ok(Json(json!({ "device": device })))
}

/// Idempotent; disconnecting an absent session is a no-op.
pub async fn ble_disconnect(State(state): State<AppState>) -> Json<Value> {
    state.tap.disconnect_ble().await;
    Json(json!({ "disconnected": true }))
}

pub async fn ble_session(
    State(state): State<AppState>,
) -> Json<crate::reader::ble::SessionInfo> {
    Json(state.tap.ble_session())
}
