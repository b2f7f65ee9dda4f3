#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, Router, extract::State, routing::post};
use hospital_os::{
    gateway::{MessagingGateway, OtpRelay},
    otp::OtpService,
    prefs::MemoryPrefs,
    reader::{
        ReaderError, TapControl,
        ble::{BleReader, GattLink, LinkConnector},
        local::LocalReader,
    },
    registry::MemoryRegistry,
    resolve::ResolutionFlow,
    server::{AppState, Server, ServerConfig},
};
use secrecy::SecretString;

/// Connector standing in for a machine with no Bluetooth hardware.
struct NoBridge;

#[async_trait]
impl LinkConnector for NoBridge {
    async fn connect(&self) -> Result<Box<dyn GattLink>, ReaderError> {
        Err(ReaderError::Connect("no Bluetooth adapter found".to_owned()))
    }
}

pub struct TestApp {
    pub addr: String,
    pub registry: MemoryRegistry,
    /// Messages the stub OTP relay accepted, as (phone, message) pairs.
    pub otp_messages: Arc<Mutex<Vec<(String, String)>>>,
}

impl TestApp {
    pub fn last_otp_code(&self) -> String {
        let messages = self.otp_messages.lock().unwrap();
        let (_, message) = messages.last().expect("no OTP delivered");
        message
            .chars()
            .filter(|c| c.is_ascii_digit())
            .take(6)
            .collect()
    }
}

/// Spawns a stub OTP relay that records every message it is asked to send.
async fn spawn_otp_relay() -> (String, Arc<Mutex<Vec<(String, String)>>>) {
    #[derive(serde::Deserialize)]
    struct SendBody {
        phone: String,
        message: String,
    }

    async fn send(
        State(messages): State<Arc<Mutex<Vec<(String, String)>>>>,
        Json(body): Json<SendBody>,
    ) -> Json<serde_json::Value> {
        messages.lock().unwrap().push((body.phone, body.message));
        Json(serde_json::json!({ "success": true }))
    }

    let messages: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
    let router = Router::new()
        .route("/send", post(send))
        .with_state(Arc::clone(&messages));
    let listener = tokio::net::TcpListener::bind("localhost:0").await.unwrap();
    let addr = format!("http://localhost:{}", listener.local_addr().unwrap().port());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, messages)
}

/// Spawns the console server on a random port, backed by the in-memory
/// registry, a recording OTP relay, and no reachable reader hardware.
pub async fn spawn_server() -> TestApp {
    spawn(None, None).await
}

pub async fn spawn_server_with_gateway(gateway_url: Option<String>) -> TestApp {
    spawn(None, gateway_url).await
}

/// Spawns the server with the local reader pointed at the given stub
/// service, for driving taps end to end over HTTP.
pub async fn spawn_server_with_reader(reader_url: String) -> TestApp {
    spawn(Some(reader_url), None).await
}

async fn spawn(reader_url: Option<String>, gateway_url: Option<String>) -> TestApp {
    let http = reqwest::Client::new();
    // Port 1 is never open; without a stub the local reader fails fast.
    let reader_url = reader_url.unwrap_or_else(|| "http://localhost:1".to_owned());
    let local = LocalReader::new(http.clone(), reader_url, 30);
    let ble = BleReader::new(Duration::from_secs(35));
    let prefs = Arc::new(MemoryPrefs::default());
    let tap = Arc::new(
        TapControl::new(local, ble, Arc::new(NoBridge), prefs)
            .await
            .unwrap(),
    );

    let registry = MemoryRegistry::default();
    let patients = Arc::new(registry.clone());
    let flow = Arc::new(ResolutionFlow::new(
        Arc::clone(&tap) as _,
        Arc::clone(&patients) as _,
    ));

    let (relay_url, otp_messages) = spawn_otp_relay().await;
    let relay = Arc::new(OtpRelay::new(http.clone(), relay_url));
    let otp = Arc::new(OtpService::new(relay as _, Arc::new(registry.clone()) as _));

    let gateway = gateway_url.map(|url| {
        Arc::new(MessagingGateway::new(
            http.clone(),
            url,
            "hospitalos",
            SecretString::from("test-secret"),
        ))
    });

    let state = AppState {
        tap,
        flow,
        patients: patients as _,
        otp: Some(otp),
        gateway,
    };

    let server_config = ServerConfig {
        host: "localhost",
        port: 0,
    };
    let server = Server::new(state, server_config).await.unwrap();
    let port = server.port().unwrap();
    tokio::spawn(async move {
        server.run().await.expect("failed to run server");
    });

    TestApp {
        addr: format!("http://localhost:{port}"),
        registry,
        otp_messages,
    }
}
