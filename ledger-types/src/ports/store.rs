//! Transaction store port.
//!
//! Adapters (in-memory, SQLite) implement this trait. The orchestrator only
//! needs to create pending records, finalize them and look them up.

use crate::domain::{NewTransaction, Transaction, TransactionReference, TransactionStatus};
use crate::error::RepoError;

/// Persistence for transaction records.
#[async_trait::async_trait]
pub trait TransactionStore: Send + Sync + 'static {
    /// Persists a new `pending` transaction.
    ///
    /// Fails with `RepoError::Conflict` if the reference is already taken.
    async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, RepoError>;

    /// Moves a pending transaction to a terminal status and returns the updated record.
    ///
    /// Fails with `RepoError::NotFound` for an unknown reference and
    /// `RepoError::Conflict` if the transaction is already terminal.
    async fn update_status(
        &self,
        reference: &TransactionReference,
        status: TransactionStatus,
    ) -> Result<Transaction, RepoError>;

    /// Finds a transaction by its reference.
    async fn find_by_reference(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Transaction>, RepoError>;
}
