//! In-memory transaction store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use ledger_types::{
    NewTransaction, RepoError, Transaction, TransactionReference, TransactionStatus,
    TransactionStore,
};

/// Transaction records keyed by reference.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    transactions: DashMap<TransactionReference, Transaction>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut all: Vec<Transaction> = self
            .transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, RepoError> {
        match self.transactions.entry(new.reference.clone()) {
            Entry::Occupied(_) => Err(RepoError::Conflict(format!(
                "Transaction reference {} already exists",
                new.reference
            ))),
            Entry::Vacant(slot) => {
                let tx = Transaction::pending(new);
                slot.insert(tx.clone());
                Ok(tx)
            }
        }
    }

    async fn update_status(
        &self,
        reference: &TransactionReference,
        status: TransactionStatus,
    ) -> Result<Transaction, RepoError> {
        let mut entry = self
            .transactions
            .get_mut(reference)
            .ok_or(RepoError::NotFound)?;

        if !entry.finalize(status) {
            return Err(RepoError::Conflict(format!(
                "Transaction {} is {}, cannot move to {}",
                reference, entry.status, status
            )));
        }
        Ok(entry.clone())
    }

    async fn find_by_reference(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Transaction>, RepoError> {
        Ok(self
            .transactions
            .get(reference)
            .map(|entry| entry.value().clone()))
    }
}
