//! Account ledger port.

use crate::domain::{Account, AccountId, Amount};
use crate::error::RepoError;

/// Owner of account balances.
///
/// `credit` and `debit` MUST be atomic per account: the balance check and the
/// update happen in one exclusive section.
#[async_trait::async_trait]
pub trait AccountLedger: Send + Sync + 'static {
    /// Returns a snapshot of the account, if it exists.
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, RepoError>;

    /// Adds `amount` to the balance and returns the updated account.
    async fn credit(&self, id: AccountId, amount: Amount) -> Result<Account, RepoError>;

    /// Subtracts `amount` from the balance and returns the updated account.
    ///
    /// Fails with `DomainError::InsufficientFunds` (wrapped in `RepoError::Domain`)
    /// without touching the balance when funds are short.
    async fn debit(&self, id: AccountId, amount: Amount) -> Result<Account, RepoError>;
}
