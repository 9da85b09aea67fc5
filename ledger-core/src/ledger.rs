//! In-process account ledger.
//!
//! Each account sits behind its own async mutex, so the funds check and the
//! balance update of a debit happen in one exclusive section while different
//! accounts proceed in parallel.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use ledger_types::{Account, AccountId, AccountLedger, Amount, DomainError, RepoError};

/// Account balances keyed by account id.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from `(id, opening balance)` pairs.
    pub fn with_accounts<I>(accounts: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (AccountId, Decimal)>,
    {
        let ledger = Self::new();
        for (id, balance) in accounts {
            ledger.open_account(id, balance)?;
        }
        Ok(ledger)
    }

    /// Opens a new account. Fails if the id is taken or the balance is negative.
    pub fn open_account(&self, id: AccountId, opening_balance: Decimal) -> Result<Account, DomainError> {
        let account = Account::with_balance(id, opening_balance)?;
        match self.accounts.entry(id) {
            Entry::Occupied(_) => Err(DomainError::DuplicateAccount(id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(account.clone())));
                tracing::debug!(account_id = %id, balance = %opening_balance, "Opened account");
                Ok(account)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    // The map guard is released before the account mutex is awaited.
    fn handle(&self, id: AccountId) -> Result<Arc<Mutex<Account>>, DomainError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(DomainError::AccountNotFound(id))
    }
}

#[async_trait]
impl AccountLedger for Ledger {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, RepoError> {
        match self.handle(id) {
            Ok(handle) => Ok(Some(handle.lock().await.clone())),
            Err(_) => Ok(None),
        }
    }

    #[tracing::instrument(skip(self), fields(account_id = %id, amount = %amount))]
    async fn credit(&self, id: AccountId, amount: Amount) -> Result<Account, RepoError> {
        let handle = self.handle(id)?;
        let mut account = handle.lock().await;

        let before = account.balance;
        account.credit(amount)?;
        tracing::debug!(%before, after = %account.balance, "Credited account");

        Ok(account.clone())
    }

    #[tracing::instrument(skip(self), fields(account_id = %id, amount = %amount))]
    async fn debit(&self, id: AccountId, amount: Amount) -> Result<Account, RepoError> {
        let handle = self.handle(id)?;
        let mut account = handle.lock().await;

        let before = account.balance;
        if let Err(e) = account.debit(amount) {
            tracing::warn!(balance = %before, "Debit refused: {}", e);
            return Err(e.into());
        }
        tracing::debug!(%before, after = %account.balance, "Debited account");

        Ok(account.clone())
    }
}
