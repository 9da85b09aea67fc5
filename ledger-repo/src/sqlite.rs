//! SQLite transaction store adapter.
#![allow(clippy::collapsible_if)]

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use ledger_types::{
    NewTransaction, RepoError, Transaction, TransactionReference, TransactionStatus,
    TransactionStore,
};

use crate::types::DbTransaction;

const SELECT_TRANSACTION: &str = r#"SELECT reference, account_id, amount, direction, status, created_at, updated_at FROM transactions WHERE reference = ?"#;

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Store
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite transaction store.
pub struct SqliteTransactionStore {
    pool: SqlitePool,
}

impl SqliteTransactionStore {
    /// Creates a new SQLite store with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if !in_memory {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` opens its own empty database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    /// Creates the database schema.
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        let ddl = include_str!("../migrations/0001_create_transactions.sql");
        sqlx::raw_sql(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, reference: &TransactionReference) -> Result<Option<Transaction>, RepoError> {
        let row: Option<DbTransaction> = sqlx::query_as(SELECT_TRANSACTION)
            .bind(reference.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbTransaction::into_domain).transpose()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ─────────────────────────────────────────────────────────────────────────────
// Store implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, RepoError> {
        let tx = Transaction::pending(new);
        let account_id = i64::try_from(tx.account_id.value())
            .map_err(|_| RepoError::Database(format!("Account id {} out of range", tx.account_id)))?;

        sqlx::query(
            r#"INSERT INTO transactions (reference, account_id, amount, direction, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(tx.reference.as_str())
        .bind(account_id)
        .bind(tx.amount.to_string())
        .bind(tx.direction.as_str())
        .bind(tx.status.as_str())
        .bind(tx.created_at.to_rfc3339())
        .bind(tx.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::Conflict(format!("Transaction reference {} already exists", tx.reference))
            } else {
                RepoError::Database(e.to_string())
            }
        })?;

        Ok(tx)
    }

    async fn update_status(
        &self,
        reference: &TransactionReference,
        status: TransactionStatus,
    ) -> Result<Transaction, RepoError> {
        if !status.is_terminal() {
            return Err(RepoError::Conflict(format!(
                "Transaction {} cannot move to {}",
                reference, status
            )));
        }

        // Only a pending row is updated, so a second finalization is a no-op
        // that we report as a conflict.
        let result = sqlx::query(
            r#"UPDATE transactions SET status = ?, updated_at = ? WHERE reference = ? AND status = 'pending'"#,
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(reference.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        let current = self.fetch(reference).await?.ok_or(RepoError::NotFound)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::Conflict(format!(
                "Transaction {} is {}, cannot move to {}",
                reference, current.status, status
            )));
        }

        Ok(current)
    }

    async fn find_by_reference(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Transaction>, RepoError> {
        self.fetch(reference).await
    }
}
