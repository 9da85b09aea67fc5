//! Domain models for the ledger service.

pub mod account;
pub mod amount;
pub mod idempotency;
pub mod transaction;

pub use account::{Account, AccountId};
pub use amount::Amount;
pub use idempotency::{IdempotencyKey, IdempotencyStatus};
pub use transaction::{
    Direction, NewTransaction, Transaction, TransactionReference, TransactionStatus,
};
