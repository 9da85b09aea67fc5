//! Transaction domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::AccountId;
use super::amount::Amount;

/// Unique reference assigned to a transaction at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionReference(String);

impl TransactionReference {
    /// Wraps an existing reference string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionReference {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The direction of a transaction relative to the account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Increases the balance
    Credit,
    /// Decreases the balance
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Lifecycle status of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Success and failed are terminal; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Everything a store needs to materialize a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub reference: TransactionReference,
    pub account_id: AccountId,
    pub amount: Amount,
    pub direction: Direction,
}

/// A recorded credit or debit.
///
/// Created `pending` before any side effect and moved to a terminal status
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique reference
    pub reference: TransactionReference,
    /// Account the transaction applies to
    pub account_id: AccountId,
    /// Amount credited or debited
    pub amount: Amount,
    /// Credit or debit
    pub direction: Direction,
    /// Current lifecycle status
    pub status: TransactionStatus,
    /// When the transaction was created
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new pending transaction.
    pub fn pending(new: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            reference: new.reference,
            account_id: new.account_id,
            amount: new.amount,
            direction: new.direction,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a transaction from stored fields.
    pub fn from_parts(
        reference: TransactionReference,
        account_id: AccountId,
        amount: Amount,
        direction: Direction,
        status: TransactionStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            account_id,
            amount,
            direction,
            status,
            created_at,
            updated_at,
        }
    }

    /// Only `pending -> success|failed` is a legal status change.
    pub fn can_transition_to(&self, status: TransactionStatus) -> bool {
        self.status == TransactionStatus::Pending && status.is_terminal()
    }

    /// Moves the transaction to a terminal status, returning false if the
    /// change is not allowed.
    pub fn finalize(&mut self, status: TransactionStatus) -> bool {
        if !self.can_transition_to(status) {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }
}
