//! Messaging gateway clients.
//!
//! Two upstreams: the wppconnect-style gateway that holds the linked
//! messaging session (QR pairing, chat relay), and a plain OTP relay
//! service used as the delivery channel for login and verification codes.
//! The console proxies the gateway verbatim; upstream JSON bodies and
//! status codes pass through untouched.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("messaging gateway unreachable: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("OTP delivery failed: {0}")]
    Delivery(String),
}

/// Upstream reply, relayed as-is to the console.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub status: u16,
    pub body: serde_json::Value,
}

impl GatewayReply {
    async fn from_response(res: reqwest::Response) -> Result<Self, GatewayError> {
        let status = res.status().as_u16();
        let body = res.json().await.unwrap_or(serde_json::Value::Null);
        Ok(Self { status, body })
    }
}

#[derive(Debug, Clone)]
pub struct MessagingGateway {
    http: reqwest::Client,
    base_url: String,
    session: String,
    secret_key: SecretString,
}

impl MessagingGateway {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: impl Into<String>,
        secret_key: SecretString,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session: session.into(),
            secret_key,
        }
    }

    fn session_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}/{endpoint}", self.base_url, self.session)
    }

    fn secret_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}/{}/{endpoint}",
            self.base_url,
            self.session,
            self.secret_key.expose_secret()
        )
    }

    /// Issues a bearer token for the configured session.
    pub async fn generate_token(&self) -> Result<GatewayReply, GatewayError> {
        let res = self
            .http
            .post(self.secret_url("generate-token"))
            .send()
            .await?;
        GatewayReply::from_response(res).await
    }

    /// Starts (or resumes) the session. The reply may carry a QR code to
    /// display or a `CONNECTED` status; both are relayed verbatim.
    pub async fn start_session(&self, token: &str) -> Result<GatewayReply, GatewayError> {
        let res = self
            .http
            .post(self.session_url("start-session"))
            .bearer_auth(token)
            .json(&json!({ "waitQrCode": false }))
            .send()
            .await?;
        GatewayReply::from_response(res).await
    }

    pub async fn session_status(&self, token: &str) -> Result<GatewayReply, GatewayError> {
        let res = self
            .http
            .get(self.session_url("check-connection-session"))
            .bearer_auth(token)
            .send()
            .await?;
        GatewayReply::from_response(res).await
    }

    pub async fn send_message(
        &self,
        token: &str,
        phone: &str,
        message: &str,
    ) -> Result<GatewayReply, GatewayError> {
        let res = self
            .http
            .post(self.session_url("send-message"))
            .bearer_auth(token)
            .json(&json!({ "phone": phone, "message": message }))
            .send()
            .await?;
        GatewayReply::from_response(res).await
    }

    /// Tears the session down in three steps. Unlinking and closing may
    /// fail on a half-connected session and are tolerated; clearing the
    /// stored session data is the step whose result the caller sees, since
    /// it decides whether the next connect needs a fresh QR scan.
    pub async fn logout(&self, token: &str) -> Result<GatewayReply, GatewayError> {
        if let Err(e) = self
            .http
            .post(self.session_url("logout-session"))
            .bearer_auth(token)
            .send()
            .await
        {
            tracing::warn!("gateway logout-session failed: {e}");
        }
        if let Err(e) = self
            .http
            .post(self.session_url("close-session"))
            .bearer_auth(token)
            .send()
            .await
        {
            tracing::warn!("gateway close-session failed: {e}");
        }
        let res = self
            .http
            .post(self.secret_url("clear-session-data"))
            .send()
            .await?;
        GatewayReply::from_response(res).await
    }
}

/// Delivery channel for OTP codes. Implemented by the relay service
/// client below and by recording mocks in tests.
#[async_trait]
pub trait OtpDelivery: Send + Sync + 'static {
    async fn send(&self, phone: &str, message: &str) -> Result<(), GatewayError>;
}

/// Plain relay service that sends one message to one phone number.
#[derive(Debug, Clone)]
pub struct OtpRelay {
    http: reqwest::Client,
    base_url: String,
}

impl OtpRelay {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl OtpDelivery for OtpRelay {
    async fn send(&self, phone: &str, message: &str) -> Result<(), GatewayError> {
        let res = self
            .http
            .post(format!("{}/send", self.base_url))
            .json(&json!({ "phone": phone, "message": message }))
            .send()
            .await?;
        if !res.status().is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(GatewayError::Delivery(detail));
        }
        Ok(())
    }
}
