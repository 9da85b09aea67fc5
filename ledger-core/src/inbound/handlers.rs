//! HTTP request handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use ledger_types::{
    AccountId, IdempotencyKeyResponse, IdempotencyKeyStatusResponse, LedgerError,
    TransactionReference,
};

use crate::{RequestContext, TransactionService};

/// Header carrying the idempotency key on credit/debit requests and on the
/// key issuance response.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Optional per-request bound on the settlement call, in milliseconds.
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Application state shared across handlers.
pub struct AppState {
    pub service: TransactionService,
}

/// Errors surfaced by the HTTP adapter.
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    BadRequest(String),
    Internal(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

/// Status code for each orchestrator outcome.
pub fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::MissingIdempotencyKey
        | LedgerError::InvalidPayload(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
        LedgerError::UnknownKey(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::KeyAlreadySucceeded(_)
        | LedgerError::KeyInProcessing(_)
        | LedgerError::KeyPreviouslyFailed(_) => StatusCode::CONFLICT,
        LedgerError::AccountNotFound(_) | LedgerError::TransactionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        LedgerError::ExternalForwarding(_) => StatusCode::BAD_GATEWAY,
        LedgerError::KeyGenerationExhausted { .. }
        | LedgerError::ReferenceExhausted { .. }
        | LedgerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Ledger(err) => (status_for(err), err.kind(), err.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "kind": kind,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Extracts the idempotency key and caller deadline from request headers.
pub fn request_context(headers: &HeaderMap) -> RequestContext {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let timeout = headers
        .get(REQUEST_TIMEOUT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis);

    RequestContext {
        idempotency_key,
        timeout,
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Issue a new idempotency key.
#[tracing::instrument(skip(state))]
pub async fn issue_key(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let issued = state.service.request_idempotency_key().await?;

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&issued.key)
        .map_err(|e| ApiError::Internal(format!("Unrepresentable key: {}", e)))?;
    headers.insert(IDEMPOTENCY_KEY_HEADER, value);

    Ok((
        StatusCode::CREATED,
        headers,
        Json(IdempotencyKeyResponse {
            idempotency_key: issued.key,
        }),
    ))
}

/// Look up the status of an idempotency key.
#[tracing::instrument(skip(state))]
pub async fn key_status(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.service.key_status(&key).await?;
    Ok(Json(IdempotencyKeyStatusResponse {
        idempotency_key: key,
        status,
    }))
}

/// Credit an account.
#[tracing::instrument(skip_all)]
pub async fn create_credit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = request_context(&headers);
    let tx = state.service.create_credit(&ctx, &body).await?;
    Ok(Json(tx))
}

/// Debit an account.
#[tracing::instrument(skip_all)]
pub async fn create_debit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = request_context(&headers);
    let tx = state.service.create_debit(&ctx, &body).await?;
    Ok(Json(tx))
}

/// Get a transaction by reference.
#[tracing::instrument(skip(state))]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tx = state
        .service
        .get_transaction(&TransactionReference::new(reference))
        .await?;
    Ok(Json(tx))
}

/// Get the settlement system's record of a transaction.
#[tracing::instrument(skip(state))]
pub async fn get_settlement_record(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .service
        .settlement_record(&TransactionReference::new(reference))
        .await?;
    Ok(Json(record))
}

/// Get account by ID.
#[tracing::instrument(skip(state))]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id: AccountId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid account ID".into()))?;

    let account = state.service.get_account(account_id).await?;
    Ok(Json(account))
}
