//! Operator console HTTP server.

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use color_eyre::eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::gateway::MessagingGateway;
use crate::otp::OtpService;
use crate::reader::TapControl;
use crate::registry::PatientDirectory;
use crate::resolve::ResolutionFlow;

pub mod errors;
pub mod handlers;

#[derive(Debug, Clone)]
pub struct ServerConfig<'a> {
    pub host: &'a str,
    pub port: u16,
}

/// Shared handler state. The gateway-backed services are optional: a desk
/// deployment without a messaging gateway still runs the card workflows.
#[derive(Clone)]
pub struct AppState {
    pub tap: Arc<TapControl>,
    pub flow: Arc<ResolutionFlow>,
    pub patients: Arc<dyn PatientDirectory>,
    pub otp: Option<Arc<OtpService>>,
    pub gateway: Option<Arc<MessagingGateway>>,
}

pub struct Server {
    router: Router,
    listener: TcpListener,
}

impl Server {
    pub async fn new(state: AppState, config: ServerConfig<'_>) -> Result<Self> {
        let listener = TcpListener::bind(format!("{}:{}", config.host, config.port))
            .await
            .wrap_err("failed to bind server address")?;

        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::PUT])
            .allow_origin(Any)
            .allow_headers(Any);
        let router = router(state).layer(TraceLayer::new_for_http()).layer(cors);

        Ok(Self { router, listener })
    }

    /// The bound port; useful when the caller asked for port 0.
    pub fn port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router)
            .await
            .wrap_err("server stopped unexpectedly")
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/reader/mode",
            get(handlers::reader::get_mode).put(handlers::reader::set_mode),
        )
        .route(
            "/api/reader/local/status",
            get(handlers::reader::local_status),
        )
        .route("/api/reader/ble/connect", post(handlers::reader::ble_connect))
        .route(
            "/api/reader/ble/disconnect",
            post(handlers::reader::ble_disconnect),
        )
        .route("/api/reader/ble/session", get(handlers::reader::ble_session))
        .route("/api/card/tap", post(handlers::card::tap))
        .route("/api/card/resolve", post(handlers::card::resolve))
        .route("/api/card/format", post(handlers::card::format))
        .route(
            "/api/patients",
            get(handlers::patients::list).post(handlers::patients::register),
        )
        .route("/api/patients/{id}", get(handlers::patients::get_by_id))
        .route(
            "/api/patients/send-otp",
            post(handlers::auth::patient_send_otp),
        )
        .route("/api/auth/request-otp", post(handlers::auth::request_otp))
        .route("/api/auth/verify-otp", post(handlers::auth::verify_otp))
        .route("/api/gateway/token", post(handlers::gateway::generate_token))
        .route(
            "/api/gateway/session/start",
            post(handlers::gateway::start_session),
        )
        .route(
            "/api/gateway/session/status",
            get(handlers::gateway::session_status),
        )
        .route("/api/gateway/message", post(handlers::gateway::send_message))
        .route(
            "/api/gateway/session/logout",
            post(handlers::gateway::logout),
        )
        .with_state(state)
}
