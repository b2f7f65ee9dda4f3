//! OTP login and patient phone verification.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::otp::OtpService;
use crate::server::{AppState, errors::ApiError};

#[derive(Debug, Deserialize)]
pub struct PhoneBody {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub phone: String,
    pub code: String,
}

fn otp_service(state: &AppState) -> Result<&Arc<OtpService>, ApiError> {
    state
        .otp
        .as_ref()
        .ok_or(ApiError::Unconfigured("OTP delivery"))
}

pub async fn request_otp(
    State(state): State<AppState>,
    Json(body): Json<PhoneBody>,
) -> Result<Json<Value>, ApiError> {
    if body.phone.trim().is_empty() {
        return Err(ApiError::BadRequest("phone number required".to_owned()));
    }
    otp_service(&state)?.request_login_otp(&body.phone).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<Value>, ApiError> {
    if body.phone.trim().is_empty() || body.code.trim().is_empty() {
        return Err(ApiError::BadRequest("phone and code required".to_owned()));
    }
    let name = otp_service(&state)?
        .verify_login_otp(&body.phone, &body.code)
        .await?;
    Ok(Json(json!({ "success": true, "name": name })))
}

/// Verification code for a patient's phone; no staff check, the patient
/// may not be registered yet.
pub async fn patient_send_otp(
    State(state): State<AppState>,
    Json(body): Json<PhoneBody>,
) -> Result<Json<Value>, ApiError> {
    if body.phone.trim().is_empty() {
        return Err(ApiError::BadRequest("phone number required".to_owned()));
    }
    otp_service(&state)?
        .request_verification_otp(&body.phone)
        .await?;
    Ok(Json(json!({ "success": true })))
}
