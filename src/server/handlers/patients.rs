//! Patient registry endpoints for the console screens.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use crate::card::CardId;
use crate::registry::{NewPatient, Patient};
use crate::server::{AppState, errors::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub card_id: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    match query.card_id {
        Some(raw) => {
            let card = CardId::new(raw)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let found = state.patients.find_by_card(&card).await?;
            Ok(Json(found.into_iter().collect()))
        }
        None => Ok(Json(state.patients.list().await?)),
    }
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    state
        .patients
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Registers a patient. A card id another record already holds comes back
/// as a conflict; the desk re-taps to find out who owns the card.
pub async fn register(
    State(state): State<AppState>,
    Json(new): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    if new.name.trim().is_empty() {
        return Err(ApiError::BadRequest("patient name required".to_owned()));
    }
    let patient = state.patients.register(new).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}
