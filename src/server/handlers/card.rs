//! Tap, resolve, and format operations on the active transport.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::reader::{CardReader, TapReading};
use crate::resolve::Resolution;
use crate::server::{AppState, errors::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct CardOpBody {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One raw tap. A blank card is a `null` identifier in a 200 reply; a
/// reader failure is an error reply. Callers must not conflate the two.
pub async fn tap(
    State(state): State<AppState>,
    body: Option<Json<CardOpBody>>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let reading = state.tap.tap(body.timeout_secs).await?;
    let card_id = match reading {
        TapReading::Card(card) => Some(card.to_string()),
        TapReading::Blank => None,
    };
    Ok(Json(json!({ "card_id": card_id })))
}

/// Full resolution gesture: tap, look up, and for a blank card write a
/// fresh identifier before offering registration.
pub async fn resolve(
    State(state): State<AppState>,
    body: Option<Json<CardOpBody>>,
) -> Result<Json<Resolution>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let resolution = state.flow.resolve(body.timeout_secs).await?;
    Ok(Json(resolution))
}

pub async fn format(
    State(state): State<AppState>,
    body: Option<Json<CardOpBody>>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    state.tap.format_card(body.timeout_secs).await?;
    Ok(Json(json!({ "success": true })))
}
