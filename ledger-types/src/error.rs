//! Error types for the ledger service.

use rust_decimal::Decimal;

use crate::domain::{AccountId, TransactionReference};

/// Domain-level errors (business rule violations).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be positive (got {0})")]
    NonPositiveAmount(Decimal),

    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Amount has too many decimal places (max {max}, got {got})")]
    TooManyDecimals { max: u32, got: u32 },

    #[error("Balance cannot be negative (got {0})")]
    NegativeBalance(Decimal),

    #[error("Balance would overflow")]
    Overflow,

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    DuplicateAccount(AccountId),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Idempotency registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown idempotency key: {0}")]
    UnknownKey(String),

    #[error("Could not allocate a unique idempotency key after {attempts} attempts")]
    KeyGenerationExhausted { attempts: u32 },

    #[error("Idempotency key {0} has already been processed")]
    AlreadySucceeded(String),

    #[error("A request with idempotency key {0} is already being processed")]
    InProcessing(String),

    #[error("A request with idempotency key {0} has failed; request a new key to retry")]
    PreviouslyFailed(String),
}

/// Settlement gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Settlement rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Settlement service unavailable: {0}")]
    Unavailable(String),

    #[error("Settlement call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

/// Application-level errors returned by the transaction orchestrator.
///
/// Every variant is a terminal outcome for the request that produced it.
/// Transport adapters map these onto status codes.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Idempotency key is required")]
    MissingIdempotencyKey,

    #[error("Unknown idempotency key: {0}")]
    UnknownKey(String),

    #[error("Idempotency key {0} has already been processed")]
    KeyAlreadySucceeded(String),

    #[error("A request with idempotency key {0} is already being processed, try again later")]
    KeyInProcessing(String),

    #[error("A request with idempotency key {0} has failed, request a new key to retry")]
    KeyPreviouslyFailed(String),

    #[error("Could not allocate a unique idempotency key after {attempts} attempts")]
    KeyGenerationExhausted { attempts: u32 },

    #[error("Could not allocate a unique transaction reference after {attempts} attempts")]
    ReferenceExhausted { attempts: u32 },

    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionReference),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("External forwarding error: {0}")]
    ExternalForwarding(String),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
}

impl LedgerError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::MissingIdempotencyKey => "MISSING_IDEMPOTENCY_KEY",
            LedgerError::UnknownKey(_) => "UNKNOWN_KEY",
            LedgerError::KeyAlreadySucceeded(_) => "KEY_ALREADY_SUCCEEDED",
            LedgerError::KeyInProcessing(_) => "KEY_IN_PROCESSING",
            LedgerError::KeyPreviouslyFailed(_) => "KEY_PREVIOUSLY_FAILED",
            LedgerError::KeyGenerationExhausted { .. } => "KEY_GENERATION_EXHAUSTED",
            LedgerError::ReferenceExhausted { .. } => "REFERENCE_EXHAUSTED",
            LedgerError::InvalidPayload(_) => "INVALID_PAYLOAD",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            LedgerError::Persistence(_) => "PERSISTENCE_ERROR",
            LedgerError::ExternalForwarding(_) => "EXTERNAL_FORWARDING_ERROR",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
        }
    }

    /// True for collaborator/infrastructure failures, false for caller input
    /// and business-rule violations.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            LedgerError::Persistence(_) | LedgerError::ExternalForwarding(_)
        )
    }

    /// True when the request was refused on entry because of its idempotency key.
    pub fn is_key_conflict(&self) -> bool {
        matches!(
            self,
            LedgerError::KeyAlreadySucceeded(_)
                | LedgerError::KeyInProcessing(_)
                | LedgerError::KeyPreviouslyFailed(_)
        )
    }
}

impl From<DomainError> for LedgerError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientFunds {
                available,
                requested,
            } => LedgerError::InsufficientFunds {
                available,
                requested,
            },
            DomainError::AccountNotFound(id) => LedgerError::AccountNotFound(id),
            DomainError::DuplicateAccount(id) => {
                LedgerError::Persistence(format!("Account already exists: {}", id))
            }
            e @ (DomainError::NonPositiveAmount(_)
            | DomainError::MalformedAmount(_)
            | DomainError::TooManyDecimals { .. }
            | DomainError::NegativeBalance(_)
            | DomainError::Overflow) => LedgerError::InvalidAmount(e.to_string()),
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => LedgerError::Persistence("Record not found".into()),
            RepoError::Database(e) => LedgerError::Persistence(e),
            RepoError::Conflict(e) => LedgerError::Persistence(e),
        }
    }
}

impl From<RegistryError> for LedgerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownKey(key) => LedgerError::UnknownKey(key),
            RegistryError::KeyGenerationExhausted { attempts } => {
                LedgerError::KeyGenerationExhausted { attempts }
            }
            RegistryError::AlreadySucceeded(key) => LedgerError::KeyAlreadySucceeded(key),
            RegistryError::InProcessing(key) => LedgerError::KeyInProcessing(key),
            RegistryError::PreviouslyFailed(key) => LedgerError::KeyPreviouslyFailed(key),
        }
    }
}

impl From<GatewayError> for LedgerError {
    fn from(err: GatewayError) -> Self {
        LedgerError::ExternalForwarding(err.to_string())
    }
}
