//! # Ledger Core
//!
//! The transaction orchestration core and its HTTP adapter.
//!
//! ## Architecture
//!
//! - `reference` - collision-checked transaction reference generation
//! - `ledger` - in-process account ledger with per-account locking
//! - `registry` - idempotency key registry (`WAITING -> PROCESSING -> SUCCESS | FAILED`)
//! - `service` - the orchestrator saga tying the above to the store and gateway
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! Collaborators are injected as `Arc<dyn Port>` so that any adapter, or a
//! test double, can be swapped in without touching the orchestrator.

pub mod inbound;
pub mod ledger;
pub mod reference;
pub mod registry;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use ledger::Ledger;
pub use reference::ReferenceGenerator;
pub use registry::KeyRegistry;
pub use service::{RequestContext, ServiceConfig, TransactionService};
