//! # Ledger Client SDK
//!
//! A typed Rust client for the Ledger API.

use ledger_types::{
    Account, AccountId, CreateTransactionRequest, ForwardTransaction, IdempotencyKeyResponse,
    IdempotencyKeyStatusResponse, Transaction,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

const IDEMPOTENCY_KEY_HEADER: &str = "X-Idempotency-Key";
const REQUEST_TIMEOUT_HEADER: &str = "X-Request-Timeout-Ms";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        kind: Option<String>,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Machine-readable error kind reported by the server, if any.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ClientError::Api { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}

/// Ledger API client.
pub struct LedgerClient {
    base_url: String,
    request_timeout_ms: Option<u64>,
    http: Client,
}

impl LedgerClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout_ms: None,
            http: Client::new(),
        }
    }

    /// Asks the server to bound settlement calls for this client's requests.
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = Some(timeout_ms);
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Requests a fresh idempotency key.
    pub async fn new_idempotency_key(&self) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(format!("{}/api/idempotency-keys", self.base_url))
            .send()
            .await?;
        let body: IdempotencyKeyResponse = self.handle_response(resp).await?;
        Ok(body.idempotency_key)
    }

    /// Gets the status of an idempotency key.
    pub async fn key_status(&self, key: &str) -> Result<IdempotencyKeyStatusResponse, ClientError> {
        self.get(&format!("/api/idempotency-keys/{}", key)).await
    }

    /// Credits an account under the given idempotency key.
    pub async fn credit(
        &self,
        idempotency_key: &str,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Transaction, ClientError> {
        let req = CreateTransactionRequest { account_id, amount };
        self.post_transaction("/api/transactions/credit", idempotency_key, &req)
            .await
    }

    /// Debits an account under the given idempotency key.
    pub async fn debit(
        &self,
        idempotency_key: &str,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Transaction, ClientError> {
        let req = CreateTransactionRequest { account_id, amount };
        self.post_transaction("/api/transactions/debit", idempotency_key, &req)
            .await
    }

    /// Gets a transaction by reference.
    pub async fn get_transaction(&self, reference: &str) -> Result<Transaction, ClientError> {
        self.get(&format!("/api/transactions/{}", reference)).await
    }

    /// Gets the settlement system's record of a transaction.
    pub async fn get_settlement_record(
        &self,
        reference: &str,
    ) -> Result<ForwardTransaction, ClientError> {
        self.get(&format!("/api/transactions/{}/settlement", reference))
            .await
    }

    /// Gets an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, ClientError> {
        self.get(&format!("/api/accounts/{}", id)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn post_transaction(
        &self,
        path: &str,
        idempotency_key: &str,
        body: &CreateTransactionRequest,
    ) -> Result<Transaction, ClientError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
            .json(body);
        if let Some(timeout_ms) = self.request_timeout_ms {
            req = req.header(REQUEST_TIMEOUT_HEADER, timeout_ms.to_string());
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<serde_json::Value>(&body).ok();
            let field = |name: &str| {
                parsed
                    .as_ref()
                    .and_then(|v| v.get(name))
                    .and_then(|v| v.as_str())
                    .map(String::from)
            };
            let kind = field("kind");
            let message = field("error").unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                kind,
                message,
            })
        }
    }
}
