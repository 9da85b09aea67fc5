//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;

use ledger_types::AccountId;

const DEFAULT_SEED_ACCOUNTS: &str = "1:400.00,2:400.00,3:400.00";

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub settlement_url: Option<String>,
    pub settlement_timeout: Duration,
    pub seed_accounts: Vec<(AccountId, Decimal)>,
    pub otlp_endpoint: Option<String>,
    pub json_logs: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a port number")?;

        let database_url = var("DATABASE_URL").unwrap_or_else(|| "memory".to_string());

        let settlement_timeout_ms: u64 = var("SETTLEMENT_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .context("SETTLEMENT_TIMEOUT_MS must be a number of milliseconds")?;

        let seed_accounts = parse_seed_accounts(
            &var("SEED_ACCOUNTS").unwrap_or_else(|| DEFAULT_SEED_ACCOUNTS.to_string()),
        )?;

        let json_logs = var("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

        Ok(Self {
            port,
            database_url,
            settlement_url: var("SETTLEMENT_URL"),
            settlement_timeout: Duration::from_millis(settlement_timeout_ms),
            seed_accounts,
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            json_logs,
        })
    }
}

/// Parses `id:balance` pairs separated by commas, e.g. `1:400.00,2:15`.
pub fn parse_seed_accounts(seeds: &str) -> anyhow::Result<Vec<(AccountId, Decimal)>> {
    seeds
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> anyhow::Result<(AccountId, Decimal)> {
            let (id, balance) = entry
                .split_once(':')
                .with_context(|| format!("Seed account '{}' must look like id:balance", entry))?;
            let id = AccountId::from_str(id)
                .with_context(|| format!("Invalid account id in seed '{}'", entry))?;
            let balance = Decimal::from_str(balance.trim())
                .with_context(|| format!("Invalid balance in seed '{}'", entry))?;
            Ok((id, balance))
        })
        .collect()
}
