//! HTTP settlement adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use ledger_types::{ForwardTransaction, GatewayError, SettlementGateway, TransactionReference};

/// Forwards transactions to a remote settlement service over HTTP.
pub struct HttpSettlementGateway {
    base_url: String,
    timeout: Duration,
    http: Client,
}

impl HttpSettlementGateway {
    /// Creates a gateway for `base_url` with a per-call timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            GatewayError::Unavailable(err.to_string())
        }
    }
}

#[async_trait]
impl SettlementGateway for HttpSettlementGateway {
    #[tracing::instrument(skip(self, tx), fields(reference = %tx.reference))]
    async fn forward(&self, tx: &ForwardTransaction) -> Result<(), GatewayError> {
        let resp = self
            .http
            .post(format!("{}/transactions", self.base_url))
            .json(tx)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "Settlement acknowledged transaction");
            return Ok(());
        }

        let message = resp.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), %message, "Settlement rejected transaction");
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    #[tracing::instrument(skip(self), fields(reference = %reference))]
    async fn lookup(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<ForwardTransaction>, GatewayError> {
        let resp = self
            .http
            .get(format!("{}/transactions/{}", self.base_url, reference))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), %message, "Settlement lookup failed");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let record = resp
            .json::<ForwardTransaction>()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Unreadable settlement record: {}", e)))?;
        Ok(Some(record))
    }
}
