//! Ledger CLI
//!
//! Command-line interface for the Ledger API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use ledger_client::LedgerClient;
use ledger_types::AccountId;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author, version, about = "Ledger API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Ledger API
    #[arg(long, env = "LEDGER_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Bound on the settlement call for credit/debit requests, in milliseconds
    #[arg(long, env = "LEDGER_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Idempotency key operations
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Credit an account
    Credit(MovementArgs),
    /// Debit an account
    Debit(MovementArgs),
    /// Transaction lookups
    Transaction {
        #[command(subcommand)]
        action: TransactionCommands,
    },
    /// Account lookups
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Local settlement service stand-in
    Settlement {
        #[command(subcommand)]
        action: SettlementCommands,
    },
    /// Check API health
    Health,
}

#[derive(clap::Args)]
struct MovementArgs {
    /// Account ID
    #[arg(long)]
    account: AccountId,
    /// Amount, at most two decimal places
    #[arg(long)]
    amount: Decimal,
    /// Idempotency key; a fresh one is requested when omitted
    #[arg(long)]
    idempotency_key: Option<String>,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Request a new idempotency key
    New,
    /// Show the status of an idempotency key
    Status {
        /// The idempotency key
        key: String,
    },
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// Get a transaction by reference
    Get {
        /// Transaction reference (TRX-...)
        reference: String,
    },
    /// Show the settlement system's record of a transaction
    Settlement {
        /// Transaction reference (TRX-...)
        reference: String,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Get account details
    Get {
        /// Account ID
        id: AccountId,
    },
}

#[derive(Subcommand)]
enum SettlementCommands {
    /// Accept and print forwarded transactions
    Listen {
        /// Port to listen on
        #[arg(long, default_value = "4000")]
        port: u16,
        /// Answer every transaction with this status code
        #[arg(long, default_value = "200")]
        status: u16,
    },
}

enum Direction {
    Credit,
    Debit,
}

async fn submit(client: &LedgerClient, direction: Direction, args: MovementArgs) -> Result<()> {
    let key = match args.idempotency_key {
        Some(key) => key,
        None => {
            let key = client.new_idempotency_key().await?;
            eprintln!("Using idempotency key {}", key);
            key
        }
    };

    let tx = match direction {
        Direction::Credit => client.credit(&key, args.account, args.amount).await?,
        Direction::Debit => client.debit(&key, args.account, args.amount).await?,
    };
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = LedgerClient::new(&cli.api_url);
    if let Some(timeout_ms) = cli.request_timeout_ms {
        client = client.with_request_timeout_ms(timeout_ms);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Key { action } => match action {
            KeyCommands::New => {
                let key = client.new_idempotency_key().await?;
                println!("{}", key);
            }
            KeyCommands::Status { key } => {
                let status = client.key_status(&key).await?;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
        },

        Commands::Credit(args) => submit(&client, Direction::Credit, args).await?,
        Commands::Debit(args) => submit(&client, Direction::Debit, args).await?,

        Commands::Transaction { action } => match action {
            TransactionCommands::Get { reference } => {
                let tx = client.get_transaction(&reference).await?;
                println!("{}", serde_json::to_string_pretty(&tx)?);
            }
            TransactionCommands::Settlement { reference } => {
                let record = client.get_settlement_record(&reference).await?;
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        },

        Commands::Account { action } => match action {
            AccountCommands::Get { id } => {
                let account = client.get_account(id).await?;
                println!("{}", serde_json::to_string_pretty(&account)?);
            }
        },

        Commands::Settlement { action } => match action {
            SettlementCommands::Listen { port, status } => {
                let status = StatusCode::from_u16(status)?;
                let settled = Settled::default();
                let app = Router::new()
                    .route(
                        "/transactions",
                        post(move |State(settled): State<Settled>, body: String| {
                            handle_settlement(settled, status, body)
                        }),
                    )
                    .route("/transactions/{reference}", get(settled_record))
                    .with_state(settled);
                let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
                println!("Settlement stand-in listening on {}", addr);
                let listener = tokio::net::TcpListener::bind(&addr).await?;
                axum::serve(listener, app).await?;
            }
        },
    }

    Ok(())
}

/// Transactions the stand-in has acknowledged, by reference.
type Settled = Arc<Mutex<HashMap<String, serde_json::Value>>>;

async fn handle_settlement(settled: Settled, status: StatusCode, body: String) -> StatusCode {
    println!("POST /transactions HTTP/1.1");
    println!("{}", body);
    println!("-> {}", status);
    println!("----------------------------------------");

    if status.is_success() {
        if let Ok(record) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(reference) = record["reference"].as_str() {
                let reference = reference.to_string();
                settled
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(reference, record);
            }
        }
    }
    status
}

async fn settled_record(
    State(settled): State<Settled>,
    Path(reference): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    println!("GET /transactions/{} HTTP/1.1", reference);
    settled
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&reference)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
