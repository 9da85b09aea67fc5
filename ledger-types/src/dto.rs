//! Data Transfer Objects (DTOs) for requests and responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Amount, IdempotencyStatus, Transaction, TransactionReference};

// ─────────────────────────────────────────────────────────────────────────────
// Transaction DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a credit or debit request.
///
/// The amount is kept as a raw decimal so that a well-formed payload with a
/// zero or negative amount is reported as an invalid amount, not as a
/// malformed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    /// Target account ID
    pub account_id: AccountId,
    /// Amount to credit or debit
    pub amount: Decimal,
}

/// What the settlement system receives for each transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardTransaction {
    pub reference: TransactionReference,
    pub account_id: AccountId,
    pub amount: Amount,
}

impl From<&Transaction> for ForwardTransaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            reference: tx.reference.clone(),
            account_id: tx.account_id,
            amount: tx.amount,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Idempotency DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Response after issuing a new idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyKeyResponse {
    pub idempotency_key: String,
}

/// Current status of an idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyKeyStatusResponse {
    pub idempotency_key: String,
    pub status: IdempotencyStatus,
}
