//! Transaction reference generation.
//!
//! References look like `TRX-{unix-nanos}-{random u64}`. Every candidate is
//! checked against the store before it is handed out, so a reference is
//! never reused even if the clock and the random source both collide.

use std::sync::Arc;

use chrono::Utc;

use ledger_types::{LedgerError, TransactionReference, TransactionStore};

/// Candidates tried before giving up with `ReferenceExhausted`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

type CandidateSource = Arc<dyn Fn() -> TransactionReference + Send + Sync>;

/// Produces store-unique transaction references.
#[derive(Clone)]
pub struct ReferenceGenerator {
    candidates: CandidateSource,
    max_attempts: u32,
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceGenerator")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl ReferenceGenerator {
    /// Generator backed by the clock and the thread-local RNG.
    pub fn new() -> Self {
        Self::with_source(DEFAULT_MAX_ATTEMPTS, candidate)
    }

    /// Generator with a custom candidate source, mostly for exercising
    /// collision handling.
    pub fn with_source<F>(max_attempts: u32, source: F) -> Self
    where
        F: Fn() -> TransactionReference + Send + Sync + 'static,
    {
        Self {
            candidates: Arc::new(source),
            max_attempts,
        }
    }

    /// Returns a reference no existing transaction in `store` carries.
    ///
    /// The check and the later insert are not atomic; the store's unique
    /// reference constraint is the final guard.
    #[tracing::instrument(skip_all)]
    pub async fn generate(
        &self,
        store: &dyn TransactionStore,
    ) -> Result<TransactionReference, LedgerError> {
        for attempt in 1..=self.max_attempts {
            let reference = (self.candidates)();
            match store.find_by_reference(&reference).await {
                Ok(None) => return Ok(reference),
                Ok(Some(_)) => {
                    tracing::warn!(attempt, %reference, "Transaction reference collision, regenerating");
                }
                Err(e) => return Err(LedgerError::Persistence(e.to_string())),
            }
        }

        tracing::error!(attempts = self.max_attempts, "Exhausted transaction reference attempts");
        Err(LedgerError::ReferenceExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// A fresh candidate reference.
pub fn candidate() -> TransactionReference {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    TransactionReference::new(format!("TRX-{}-{}", nanos, rand::random::<u64>()))
}
