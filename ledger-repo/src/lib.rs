//! # Ledger Repository
//!
//! Concrete transaction store implementations (adapters) for the ledger service.
//! This crate provides the adapters that implement the `TransactionStore` port:
//!
//! - `memory` - lock-free in-process store, always available
//! - `sqlite` - durable store behind the `sqlite` feature

use async_trait::async_trait;
use ledger_types::{
    NewTransaction, RepoError, Transaction, TransactionReference, TransactionStatus,
    TransactionStore,
};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
mod types;


pub use memory::InMemoryTransactionStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTransactionStore;

/// Unified store wrapper selected at startup from a database URL.
pub enum Store {
    Memory(InMemoryTransactionStore),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteTransactionStore),
}

/// Build and initialize a transaction store from a database URL.
///
/// - `memory` (or an empty string) gives the in-memory store
/// - `sqlite:...` connects, runs migrations and gives the SQLite store
///
/// # Examples
///
/// ```ignore
/// let store = build_store("memory").await?;
///
/// // With the `sqlite` feature
/// let store = build_store("sqlite://data/ledger.db?mode=rwc").await?;
/// ```
pub async fn build_store(database_url: &str) -> anyhow::Result<Store> {
    Store::new(database_url).await
}

impl Store {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let url = database_url.trim();
        if url.is_empty() || url.eq_ignore_ascii_case("memory") {
            tracing::info!("Using in-memory transaction store");
            return Ok(Store::Memory(InMemoryTransactionStore::new()));
        }

        if url.starts_with("sqlite:") {
            return Self::sqlite(url).await;
        }

        anyhow::bail!("Unsupported DATABASE_URL: {}", url)
    }

    #[cfg(feature = "sqlite")]
    async fn sqlite(url: &str) -> anyhow::Result<Self> {
        tracing::info!("Using SQLite transaction store");
        Ok(Store::Sqlite(SqliteTransactionStore::new(url).await?))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn sqlite(url: &str) -> anyhow::Result<Self> {
        anyhow::bail!("{} requires the `sqlite` feature", url)
    }

    /// Short name of the active backend.
    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Store::Sqlite(_) => "sqlite",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Implement TransactionStore for Store (delegation)
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TransactionStore for Store {
    async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, RepoError> {
        match self {
            Store::Memory(inner) => inner.create_transaction(new).await,
            #[cfg(feature = "sqlite")]
            Store::Sqlite(inner) => inner.create_transaction(new).await,
        }
    }

    async fn update_status(
        &self,
        reference: &TransactionReference,
        status: TransactionStatus,
    ) -> Result<Transaction, RepoError> {
        match self {
            Store::Memory(inner) => inner.update_status(reference, status).await,
            #[cfg(feature = "sqlite")]
            Store::Sqlite(inner) => inner.update_status(reference, status).await,
        }
    }

    async fn find_by_reference(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Transaction>, RepoError> {
        match self {
            Store::Memory(inner) => inner.find_by_reference(reference).await,
            #[cfg(feature = "sqlite")]
            Store::Sqlite(inner) => inner.find_by_reference(reference).await,
        }
    }
}
