use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an idempotency key: `WAITING -> PROCESSING -> SUCCESS | FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    #[default]
    Waiting,
    Processing,
    Success,
    Failed,
}

impl IdempotencyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl AsRef<str> for IdempotencyStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::Waiting => "WAITING",
            Self::Processing => "PROCESSING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// A client-held token that lets a request be retried without being applied twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub key: String,
    pub status: IdempotencyStatus,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            status: IdempotencyStatus::Waiting,
            issued_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the status and bumps `updated_at`.
    pub fn set_status(&mut self, status: IdempotencyStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
