//! HTTP API tests against the in-memory ledger

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use lc_core::crypto::hash_document;
use lc_core::ledger::{InMemoryLedger, MemoryLedgerConfig};
use lc_core::metrics::Metrics;
use lc_core::secrets::InMemorySecretStore;
use lc_core::{Address, Config, LcService, ManualClock};
use lc_gateway::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SELLER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
const SELLER_BANK: &str = "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb";
const BOUNDARY: &str = "lc-test-boundary";

struct TestApp {
    app: Router,
    ledger: Arc<InMemoryLedger>,
    buyer: Address,
    bank: Address,
}

fn test_app() -> TestApp {
    test_app_with_limit(1024 * 1024)
}

fn test_app_with_limit(max_document_bytes: usize) -> TestApp {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let ledger = Arc::new(InMemoryLedger::new(
        MemoryLedgerConfig {
            poll_interval: Duration::from_millis(5),
            ..MemoryLedgerConfig::default()
        },
        clock.clone(),
    ));

    let secrets = Arc::new(InMemorySecretStore::new());
    let buyer = secrets.insert_seed([1u8; 32]);
    let bank = secrets.insert_seed([2u8; 32]);

    let mut config = Config::default();
    config.pipeline.confirmation_timeout_ms = 2_000;
    config.pipeline.retry.initial_delay_ms = 1;
    config.parties.default_buyer_bank = Some(bank);

    let metrics = Arc::new(Metrics::new().unwrap());
    let service = Arc::new(LcService::new(
        ledger.clone(),
        secrets,
        &config,
        clock,
        metrics.clone(),
    ));

    let state = AppState {
        service,
        metrics,
        default_signer: Some(buyer),
        service_name: "lc-gateway".to_string(),
    };

    TestApp {
        app: router(state, max_document_bytes),
        ledger,
        buyer,
        bank,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_as(uri: &str, signer: &Address) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("X-Signer-Address", signer.to_checksum())
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn multipart(uri: &str, field: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"invoice.pdf\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn create_body() -> Value {
    json!({
        "seller": SELLER,
        "sellerBank": SELLER_BANK,
        "amount": 1000,
        "expiryDays": 30,
    })
}

#[tokio::test]
async fn test_create_and_fetch_details() {
    let t = test_app();

    let (status, body) = send(&t.app, post_json("/api/lc/create", create_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "LC created successfully");
    assert_eq!(body["lcId"], 1);
    assert!(body["transactionHash"].as_str().unwrap().starts_with("0x"));

    let (status, details) = send(&t.app, get("/api/lc/details/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["lcId"], 1);
    assert_eq!(details["buyer"], t.buyer.to_checksum());
    assert_eq!(details["buyerBank"], t.bank.to_checksum());
    assert_eq!(details["seller"], SELLER);
    assert_eq!(details["amount"], 1000);
    assert_eq!(details["state"], "Created");
    assert_eq!(details["isActive"], true);
    assert!(details["documentHash"].is_null());
    assert!(details["expiryDate"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let t = test_app();
    send(&t.app, post_json("/api/lc/create", create_body())).await;

    let (status, body) = send(&t.app, post_as("/api/lc/approve/1", &t.bank)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "LC approved successfully");

    let documents = b"%PDF-1.7 bill of lading";
    let (status, body) = send(
        &t.app,
        multipart("/api/lc/submit-documents/1", "documents", documents),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Documents submitted successfully");
    assert_eq!(body["documentHash"], hash_document(documents).to_hex());

    let (status, body) = send(&t.app, post_as("/api/lc/close/1", &t.bank)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "LC closed successfully");

    let reference = body["transactionHash"].as_str().unwrap().to_string();
    let (status, op) = send(&t.app, get(&format!("/api/lc/operations/{}", reference))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(op["status"], "finalized");
    assert_eq!(op["transactionHash"], reference);

    let (_, details) = send(&t.app, get("/api/lc/details/1")).await;
    assert_eq!(details["state"], "Closed");
    assert_eq!(details["isActive"], false);
}

#[tokio::test]
async fn test_invalid_create_is_bad_request() {
    let t = test_app();
    let body = json!({
        "seller": "0xSeller",
        "sellerBank": SELLER_BANK,
        "amount": -5,
        "expiryDays": 0,
    });

    let (status, body) = send(&t.app, post_json("/api/lc/create", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");
    assert_eq!(t.ledger.stats().submissions, 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let t = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/lc/create")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");
}

#[tokio::test]
async fn test_missing_documents_is_bad_request() {
    let t = test_app();
    send(&t.app, post_json("/api/lc/create", create_body())).await;
    send(&t.app, post_as("/api/lc/approve/1", &t.bank)).await;
    let submissions = t.ledger.stats().submissions;

    let (status, body) = send(
        &t.app,
        multipart("/api/lc/submit-documents/1", "attachment", b"invoice"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No documents provided");

    let (status, _) = send(
        &t.app,
        multipart("/api/lc/submit-documents/1", "documents", b""),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.ledger.stats().submissions, submissions);
}

#[tokio::test]
async fn test_oversized_documents_are_rejected_with_413() {
    let t = test_app_with_limit(512);
    send(&t.app, post_json("/api/lc/create", create_body())).await;
    send(&t.app, post_as("/api/lc/approve/1", &t.bank)).await;
    let submissions = t.ledger.stats().submissions;

    let oversized = vec![b'x'; 8 * 1024];
    let (status, body) = send(
        &t.app,
        multipart("/api/lc/submit-documents/1", "documents", &oversized),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["kind"], "ValidationError");
    assert_eq!(t.ledger.stats().submissions, submissions);

    let (status, _) = send(
        &t.app,
        multipart("/api/lc/submit-documents/1", "documents", b"invoice"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_documents_before_approval_is_conflict() {
    let t = test_app();
    send(&t.app, post_json("/api/lc/create", create_body())).await;

    let (status, body) = send(
        &t.app,
        multipart("/api/lc/submit-documents/1", "documents", b"invoice"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "StateConflict");
}

#[tokio::test]
async fn test_wrong_signer_is_forbidden() {
    let t = test_app();
    send(&t.app, post_json("/api/lc/create", create_body())).await;

    let (status, body) = send(&t.app, post_as("/api/lc/approve/1", &t.buyer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "Unauthorized");
}

#[tokio::test]
async fn test_unknown_lc_is_not_found() {
    let t = test_app();
    let (status, body) = send(&t.app, get("/api/lc/details/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NotFound");
}

#[tokio::test]
async fn test_bad_path_and_header_are_rejected() {
    let t = test_app();

    let (status, _) = send(&t.app, get("/api/lc/details/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/api/lc/approve/1")
        .header("X-Signer-Address", "0x1234")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");

    let (status, _) = send(&t.app, get("/api/lc/operations/not-a-hash")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let t = test_app();

    let (status, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ledger_reachable"], true);

    send(&t.app, post_json("/api/lc/create", create_body())).await;

    let (status, body) = send(&t.app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("lc_operations_submitted_total 1"));
}
