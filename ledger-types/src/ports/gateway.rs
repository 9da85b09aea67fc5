//! Settlement gateway port.
//!
//! The settlement system is the external system of record. Its wire protocol
//! is the adapter's business; the orchestrator only sees success or failure.

use crate::domain::TransactionReference;
use crate::dto::ForwardTransaction;
use crate::error::GatewayError;

/// Port trait for forwarding transactions to the settlement system.
#[async_trait::async_trait]
pub trait SettlementGateway: Send + Sync + 'static {
    /// Forwards one transaction. `Ok(())` means the settlement system
    /// acknowledged it.
    async fn forward(&self, tx: &ForwardTransaction) -> Result<(), GatewayError>;

    /// Fetches the settlement system's copy of a transaction. `Ok(None)` when
    /// it has never seen the reference.
    async fn lookup(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<ForwardTransaction>, GatewayError>;
}
