//! Account domain model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use crate::error::DomainError;

/// Unique identifier for an Account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u64);

impl AccountId {
    /// Creates an AccountId from its numeric value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// An account holding a non-negative decimal balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Current balance, never negative
    pub balance: Decimal,
}

impl Account {
    /// Creates an account with zero balance.
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: Decimal::ZERO,
        }
    }

    /// Creates an account with an opening balance.
    ///
    /// # Validation
    /// - Opening balance cannot be negative
    pub fn with_balance(id: AccountId, balance: Decimal) -> Result<Self, DomainError> {
        if balance < Decimal::ZERO {
            return Err(DomainError::NegativeBalance(balance));
        }
        Ok(Self { id, balance })
    }

    /// Credits (adds) money to the account.
    pub fn credit(&mut self, amount: Amount) -> Result<(), DomainError> {
        self.balance = self
            .balance
            .checked_add(amount.value())
            .ok_or(DomainError::Overflow)?;
        Ok(())
    }

    /// Debits (subtracts) money from the account.
    ///
    /// Refused, never clamped: the balance is untouched on failure.
    pub fn debit(&mut self, amount: Amount) -> Result<(), DomainError> {
        if !self.has_sufficient_funds(&amount) {
            return Err(DomainError::InsufficientFunds {
                available: self.balance,
                requested: amount.value(),
            });
        }
        self.balance -= amount.value();
        Ok(())
    }

    /// Checks if the account has sufficient funds for a debit.
    pub fn has_sufficient_funds(&self, amount: &Amount) -> bool {
        self.balance >= amount.value()
    }
}
