//! In-memory idempotency key registry.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use ledger_types::{IdempotencyKey, IdempotencyRegistry, IdempotencyStatus, RegistryError};

/// Candidate keys tried before giving up with `KeyGenerationExhausted`.
pub const DEFAULT_MAX_KEY_ATTEMPTS: u32 = 10;

type KeySource = Arc<dyn Fn() -> String + Send + Sync>;

/// Issues UUID keys and tracks their status.
pub struct KeyRegistry {
    keys: DashMap<String, IdempotencyKey>,
    source: KeySource,
    max_attempts: u32,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::with_source(DEFAULT_MAX_KEY_ATTEMPTS, || uuid::Uuid::new_v4().to_string())
    }

    /// Registry with a custom key source.
    pub fn with_source<F>(max_attempts: u32, source: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            keys: DashMap::new(),
            source: Arc::new(source),
            max_attempts,
        }
    }

    /// Snapshot of a key record.
    pub fn get(&self, key: &str) -> Option<IdempotencyKey> {
        self.keys.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl IdempotencyRegistry for KeyRegistry {
    async fn issue_key(&self) -> Result<IdempotencyKey, RegistryError> {
        for attempt in 1..=self.max_attempts {
            match self.keys.entry((self.source)()) {
                Entry::Vacant(slot) => {
                    let issued = IdempotencyKey::new(slot.key().clone());
                    slot.insert(issued.clone());
                    tracing::debug!(key = %issued.key, "Issued idempotency key");
                    return Ok(issued);
                }
                Entry::Occupied(slot) => {
                    tracing::warn!(attempt, key = %slot.key(), "Idempotency key collision, regenerating");
                }
            }
        }

        Err(RegistryError::KeyGenerationExhausted {
            attempts: self.max_attempts,
        })
    }

    async fn status(&self, key: &str) -> Result<IdempotencyStatus, RegistryError> {
        self.keys
            .get(key)
            .map(|entry| entry.status)
            .ok_or_else(|| RegistryError::UnknownKey(key.to_string()))
    }

    async fn transition(&self, key: &str, status: IdempotencyStatus) -> Result<(), RegistryError> {
        let mut entry = self
            .keys
            .get_mut(key)
            .ok_or_else(|| RegistryError::UnknownKey(key.to_string()))?;

        if entry.status.is_terminal() {
            tracing::warn!(key, from = %entry.status, to = %status, "Overwriting settled idempotency key");
        } else {
            tracing::debug!(key, from = %entry.status, to = %status, "Idempotency key transition");
        }
        entry.set_status(status);
        Ok(())
    }

    async fn claim(&self, key: &str) -> Result<(), RegistryError> {
        // The write guard makes the observe-and-advance a single step.
        let mut entry = self
            .keys
            .get_mut(key)
            .ok_or_else(|| RegistryError::UnknownKey(key.to_string()))?;

        match entry.status {
            IdempotencyStatus::Waiting => {
                entry.set_status(IdempotencyStatus::Processing);
                Ok(())
            }
            IdempotencyStatus::Processing => Err(RegistryError::InProcessing(key.to_string())),
            IdempotencyStatus::Success => Err(RegistryError::AlreadySucceeded(key.to_string())),
            IdempotencyStatus::Failed => Err(RegistryError::PreviouslyFailed(key.to_string())),
        }
    }
}
