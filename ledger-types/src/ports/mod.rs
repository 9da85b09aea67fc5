//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The orchestrator depends on these traits, not concrete implementations.

mod gateway;
mod ledger;
mod registry;
mod store;

pub use gateway::SettlementGateway;
pub use ledger::AccountLedger;
pub use registry::IdempotencyRegistry;
pub use store::TransactionStore;
