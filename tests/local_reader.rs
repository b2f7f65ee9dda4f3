//! Drives the local reader client against a scripted stand-in for the
//! reader service, pinning the wire contract down to the error strings.

use axum::{Json, Router, http::StatusCode, routing::get, routing::post};
use hospital_os::card::CardId;
use hospital_os::reader::{ReaderError, TapReading, local::LocalReader};
use serde_json::{Value, json};

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("localhost:0").await.unwrap();
    let addr = format!("http://localhost:{}", listener.local_addr().unwrap().port());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn reader(addr: &str) -> LocalReader {
    LocalReader::new(reqwest::Client::new(), addr, 30)
}

#[tokio::test]
async fn read_reports_the_card_identifier() {
    let addr = spawn_stub(Router::new().route(
        "/read",
        post(|Json(body): Json<Value>| async move {
            // The caller-supplied timeout reaches the service.
            assert_eq!(body["timeout"], 7);
            Json(json!({ "nfc_id": "A1B2C3D4E5F6A7B8", "uid": "04:AA:BB" }))
        }),
    ))
    .await;

    let reading = reader(&addr).read(Some(7)).await.unwrap();
    assert_eq!(
        reading,
        TapReading::Card(CardId::new("A1B2C3D4E5F6A7B8").unwrap())
    );
}

#[tokio::test]
async fn read_with_null_identifier_is_a_blank_card() {
    let addr = spawn_stub(Router::new().route(
        "/read",
        post(|| async { Json(json!({ "nfc_id": null })) }),
    ))
    .await;

    assert_eq!(reader(&addr).read(None).await.unwrap(), TapReading::Blank);
}

#[tokio::test]
async fn service_error_string_is_surfaced_verbatim() {
    let addr = spawn_stub(Router::new().route(
        "/read",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "reader is rebooting" })),
            )
        }),
    ))
    .await;

    let err = reader(&addr).read(None).await.unwrap_err();
    assert!(matches!(err, ReaderError::Service(m) if m == "reader is rebooting"));
}

#[tokio::test]
async fn unusable_error_body_falls_back_to_the_operation_message() {
    let addr = spawn_stub(Router::new().route(
        "/write",
        post(|| async { (StatusCode::BAD_GATEWAY, "not json") }),
    ))
    .await;

    let card = CardId::new("A1B2C3D4E5F6A7B8").unwrap();
    let err = reader(&addr).write(&card, None).await.unwrap_err();
    assert!(matches!(err, ReaderError::Service(m) if m == "NFC write failed"));
}

#[tokio::test]
async fn write_passes_the_identifier_and_reports_soft_failures() {
    let addr = spawn_stub(Router::new().route(
        "/write",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["nfc_id"], "FFFFFFFFFFFFFFFF");
            Json(json!({ "success": false, "error": "card is write-protected" }))
        }),
    ))
    .await;

    let card = CardId::new("FFFFFFFFFFFFFFFF").unwrap();
    let err = reader(&addr).write(&card, None).await.unwrap_err();
    assert!(matches!(err, ReaderError::Service(m) if m == "card is write-protected"));
}

#[tokio::test]
async fn format_round_trip() {
    let addr = spawn_stub(Router::new().route(
        "/format",
        post(|| async { Json(json!({ "success": true })) }),
    ))
    .await;

    reader(&addr).format(Some(10)).await.unwrap();
}

#[tokio::test]
async fn status_reports_the_service_health() {
    let addr = spawn_stub(Router::new().route(
        "/status",
        get(|| async {
            Json(json!({ "status": "ready", "hardware": true, "simulate": false }))
        }),
    ))
    .await;

    let status = reader(&addr).status().await.unwrap();
    assert_eq!(status.status, "ready");
    assert!(status.hardware);
    assert!(!status.simulate);
}

#[tokio::test]
async fn unreachable_service_is_its_own_error() {
    let unreachable = reader("http://localhost:1");
    let err = unreachable.read(Some(1)).await.unwrap_err();
    assert!(matches!(err, ReaderError::Unreachable(_)));
}
