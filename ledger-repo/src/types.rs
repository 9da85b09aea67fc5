//! Database row types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use ledger_types::{AccountId, Amount, RepoError, Transaction, TransactionReference};

/// Transaction row from database.
///
/// Amounts are stored as decimal text and timestamps as RFC 3339 so no
/// precision is lost to SQLite's REAL type.
#[derive(FromRow)]
pub struct DbTransaction {
    pub reference: String,
    pub account_id: i64,
    pub amount: String,
    pub direction: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> RepoError {
    RepoError::Database(format!("Corrupt {} column: {}", field, err))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| corrupt(field, e))?
        .with_timezone(&Utc))
}

impl DbTransaction {
    pub fn into_domain(self) -> Result<Transaction, RepoError> {
        let account_id = u64::try_from(self.account_id).map_err(|e| corrupt("account_id", e))?;
        let amount = Decimal::from_str(&self.amount).map_err(|e| corrupt("amount", e))?;
        let amount = Amount::new(amount)?;

        Ok(Transaction::from_parts(
            TransactionReference::new(self.reference),
            AccountId::new(account_id),
            amount,
            self.direction.parse().map_err(|e| corrupt("direction", e))?,
            self.status.parse().map_err(|e| corrupt("status", e))?,
            parse_timestamp("created_at", &self.created_at)?,
            parse_timestamp("updated_at", &self.updated_at)?,
        ))
    }
}
