//! Client for the local NFC reader service.
//!
//! The reader service runs on the desk machine itself and exposes plain
//! request/response endpoints. Every call is independent: no session, no
//! retries, and a non-2xx reply surfaces the service's own `error` string
//! verbatim to the operator.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::card::CardId;

use super::TapReading;
use super::error::ReaderError;

#[derive(Debug, Deserialize)]
struct ReadReply {
    nfc_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: Option<String>,
}

/// Health report of the local reader service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStatus {
    pub status: String,
    pub hardware: bool,
    pub simulate: bool,
}

#[derive(Debug, Clone)]
pub struct LocalReader {
    http: reqwest::Client,
    base_url: String,
    default_timeout_secs: u64,
}

impl LocalReader {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, default_timeout_secs: u64) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            default_timeout_secs,
        }
    }

    /// Asks the service to scan for a card within the timeout window.
    pub async fn read(&self, timeout_secs: Option<u64>) -> Result<TapReading, ReaderError> {
        let timeout = timeout_secs.unwrap_or(self.default_timeout_secs);
        let res = self
            .http
            .post(format!("{}/read", self.base_url))
            .json(&json!({ "timeout": timeout }))
            .send()
            .await
            .map_err(ReaderError::Unreachable)?;
        if !res.status().is_success() {
            return Err(service_error(res, "NFC read failed").await);
        }
        let reply: ReadReply = res
            .json()
            .await
            .map_err(|e| ReaderError::Payload(e.to_string()))?;
        match reply.nfc_id {
            Some(id) if !id.trim().is_empty() => {
                let card = CardId::new(id).map_err(|e| ReaderError::Payload(e.to_string()))?;
                Ok(TapReading::Card(card))
            }
            _ => Ok(TapReading::Blank),
        }
    }

    /// Writes the identifier onto the presented card.
    pub async fn write(&self, card: &CardId, timeout_secs: Option<u64>) -> Result<(), ReaderError> {
        let timeout = timeout_secs.unwrap_or(self.default_timeout_secs);
        let res = self
            .http
            .post(format!("{}/write", self.base_url))
            .json(&json!({ "nfc_id": card.as_str(), "timeout": timeout }))
            .send()
            .await
            .map_err(ReaderError::Unreachable)?;
        if !res.status().is_success() {
            return Err(service_error(res, "NFC write failed").await);
        }
        let reply: WriteReply = res
            .json()
            .await
            .map_err(|e| ReaderError::Payload(e.to_string()))?;
        if reply.success {
            Ok(())
        } else {
            Err(ReaderError::Service(
                reply.error.unwrap_or_else(|| "NFC write failed".to_owned()),
            ))
        }
    }

    /// Erases the presented card back to the blank state.
    pub async fn format(&self, timeout_secs: Option<u64>) -> Result<(), ReaderError> {
        let timeout = timeout_secs.unwrap_or(self.default_timeout_secs);
        let res = self
            .http
            .post(format!("{}/format", self.base_url))
            .json(&json!({ "timeout": timeout }))
            .send()
            .await
            .map_err(ReaderError::Unreachable)?;
        if !res.status().is_success() {
            return Err(service_error(res, "NFC format failed").await);
        }
        let reply: WriteReply = res
            .json()
            .await
            .map_err(|e| ReaderError::Payload(e.to_string()))?;
        if reply.success {
            Ok(())
        } else {
            Err(ReaderError::Service(
                reply.error.unwrap_or_else(|| "NFC format failed".to_owned()),
            ))
        }
    }

    pub async fn status(&self) -> Result<LocalStatus, ReaderError> {
        let res = self
            .http
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .map_err(ReaderError::Unreachable)?;
        if !res.status().is_success() {
            return Err(ReaderError::Service("NFC server unreachable".to_owned()));
        }
        res.json()
            .await
            .map_err(|e| ReaderError::Payload(e.to_string()))
    }
}

/// Extracts the service's own `error` string from a failed reply, falling
/// back to a fixed per-operation message when the body is unusable.
async fn service_error(res: reqwest::Response, fallback: &str) -> ReaderError {
    let message = match res.json::<ErrorReply>().await {
        Ok(ErrorReply { error: Some(e) }) => e,
        _ => fallback.to_owned(),
    };
    ReaderError::Service(message)
}
