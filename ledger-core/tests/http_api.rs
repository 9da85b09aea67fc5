//! Integration tests for the HTTP adapter.
//!
//! These drive the full router with in-memory adapters and verify status
//! codes, headers and JSON bodies.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use tower::ServiceExt;

use ledger_core::{KeyRegistry, Ledger, TransactionService, inbound::HttpServer};
use ledger_repo::InMemoryTransactionStore;
use ledger_types::AccountId;
use settlement_gateway::RecordingGateway;

fn create_app(gateway: RecordingGateway) -> Router {
    let ledger = Ledger::with_accounts([
        (AccountId::new(1), dec!(400.00)),
        (AccountId::new(2), dec!(50.00)),
    ])
    .unwrap();

    let service = TransactionService::new(
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(ledger),
        Arc::new(gateway),
        Arc::new(KeyRegistry::new()),
    );
    HttpServer::new(service).router()
}

fn transaction_request(path: &str, key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("Content-Type", "application/json");
    if let Some(key) = key {
        builder = builder.header("X-Idempotency-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn issue_key(app: &Router) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/idempotency-keys")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let header = response
        .headers()
        .get("x-idempotency-key")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = json(response).await;
    assert_eq!(body["idempotency_key"], header);
    header
}

#[tokio::test]
async fn test_health() {
    let app = create_app(RecordingGateway::new());
    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_issued_key_starts_waiting() {
    let app = create_app(RecordingGateway::new());
    let key = issue_key(&app).await;

    let response = app
        .oneshot(get(&format!("/api/idempotency-keys/{}", key)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "WAITING");
}

#[tokio::test]
async fn test_credit_then_replay() {
    let app = create_app(RecordingGateway::new());
    let key = issue_key(&app).await;
    let body = r#"{"account_id": 1, "amount": "100.00"}"#;

    let response = app
        .clone()
        .oneshot(transaction_request("/api/transactions/credit", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tx = json(response).await;
    assert_eq!(tx["status"], "success");
    assert_eq!(tx["direction"], "credit");
    assert_eq!(tx["amount"], "100.00");

    let reference = tx["reference"].as_str().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(get(&format!("/api/transactions/{}", reference)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["reference"], reference);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/transactions/{}/settlement", reference)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = json(response).await;
    assert_eq!(record["reference"], reference);
    assert_eq!(record["account_id"], 1);
    assert_eq!(record["amount"], "100.00");

    let response = app
        .clone()
        .oneshot(transaction_request("/api/transactions/credit", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json(response).await["kind"], "KEY_ALREADY_SUCCEEDED");

    let response = app.oneshot(get("/api/accounts/1")).await.unwrap();
    assert_eq!(json(response).await["balance"], "500.00");
}

#[tokio::test]
async fn test_missing_and_unknown_keys() {
    let app = create_app(RecordingGateway::new());
    let body = r#"{"account_id": 1, "amount": "1.00"}"#;

    let response = app
        .clone()
        .oneshot(transaction_request("/api/transactions/debit", None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["kind"], "MISSING_IDEMPOTENCY_KEY");

    let response = app
        .oneshot(transaction_request("/api/transactions/debit", Some("bogus"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json(response).await["kind"], "UNKNOWN_KEY");
}

#[tokio::test]
async fn test_malformed_body_burns_key() {
    let app = create_app(RecordingGateway::new());
    let key = issue_key(&app).await;

    let response = app
        .clone()
        .oneshot(transaction_request("/api/transactions/credit", Some(&key), "{oops"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["kind"], "INVALID_PAYLOAD");

    let response = app
        .oneshot(get(&format!("/api/idempotency-keys/{}", key)))
        .await
        .unwrap();
    assert_eq!(json(response).await["status"], "FAILED");
}

#[tokio::test]
async fn test_insufficient_funds() {
    let app = create_app(RecordingGateway::new());
    let key = issue_key(&app).await;

    let response = app
        .clone()
        .oneshot(transaction_request(
            "/api/transactions/debit",
            Some(&key),
            r#"{"account_id": 2, "amount": 100}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["kind"], "INSUFFICIENT_FUNDS");
    assert_eq!(body["code"], 400);

    let response = app.oneshot(get("/api/accounts/2")).await.unwrap();
    assert_eq!(json(response).await["balance"], "50.00");
}

#[tokio::test]
async fn test_settlement_failure_is_bad_gateway() {
    let app = create_app(RecordingGateway::failing());
    let key = issue_key(&app).await;

    let response = app
        .clone()
        .oneshot(transaction_request(
            "/api/transactions/credit",
            Some(&key),
            r#"{"account_id": 1, "amount": 10}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json(response).await["kind"], "EXTERNAL_FORWARDING_ERROR");

    let response = app.oneshot(get("/api/accounts/1")).await.unwrap();
    assert_eq!(json(response).await["balance"], "400.00");
}

#[tokio::test]
async fn test_not_found_routes() {
    let app = create_app(RecordingGateway::new());

    let response = app.clone().oneshot(get("/api/accounts/99")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(get("/api/accounts/abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/api/transactions/TRX-0-0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(get("/api/transactions/TRX-0-0/settlement"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/api/idempotency-keys/unknown"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
