//! Maps service failures onto operator-facing JSON error replies.
//!
//! Every error leaves the API as `{"error": <message>}` with a status the
//! taxonomy dictates: 408 for no-card-in-time, 409 for busy or conflicting
//! state, 502 for a misbehaving upstream, 503 for a transport that is not
//! ready. A blank card or an unknown identifier is never an error; those
//! are ordinary resolution outcomes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::otp::OtpError;
use crate::reader::ReaderError;
use crate::registry::RegistryError;
use crate::resolve::FlowError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("{0} is not configured on this server")]
    Unconfigured(&'static str),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Reader(e) => reader_status(e),
            Self::Flow(FlowError::Reader(e)) => reader_status(e),
            Self::Flow(FlowError::Registry(e)) => registry_status(e),
            Self::Flow(FlowError::IdExhausted) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Registry(e) => registry_status(e),
            Self::Otp(e) => otp_status(e),
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn reader_status(error: &ReaderError) -> StatusCode {
    match error {
        ReaderError::Timeout | ReaderError::NoCard => StatusCode::REQUEST_TIMEOUT,
        ReaderError::Busy => StatusCode::CONFLICT,
        ReaderError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        ReaderError::Prefs(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ReaderError::Connect(_)
        | ReaderError::ConnectionLost
        | ReaderError::Device(_)
        | ReaderError::Service(_)
        | ReaderError::UnexpectedStatus(_)
        | ReaderError::Unreachable(_)
        | ReaderError::Payload(_) => StatusCode::BAD_GATEWAY,
    }
}

fn registry_status(error: &RegistryError) -> StatusCode {
    match error {
        RegistryError::DuplicateCardId(_) => StatusCode::CONFLICT,
        RegistryError::Upstream(_) | RegistryError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

fn otp_status(error: &OtpError) -> StatusCode {
    match error {
        OtpError::UnknownPhone => StatusCode::BAD_REQUEST,
        OtpError::Invalid | OtpError::Expired => StatusCode::UNAUTHORIZED,
        OtpError::Delivery(_) => StatusCode::BAD_GATEWAY,
        OtpError::Registry(e) => registry_status(e),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        } else {
            tracing::debug!("request rejected: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
