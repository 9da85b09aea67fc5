//! # Ledger Types
//!
//! Domain types and port traits for the ledger settlement service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Amount, Account, Transaction, IdempotencyKey)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain, adapter and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Account, AccountId, Amount, Direction, IdempotencyKey, IdempotencyStatus, NewTransaction,
    Transaction, TransactionReference, TransactionStatus,
};
pub use dto::*;
pub use error::{DomainError, GatewayError, LedgerError, RegistryError, RepoError};
pub use ports::{AccountLedger, IdempotencyRegistry, SettlementGateway, TransactionStore};
