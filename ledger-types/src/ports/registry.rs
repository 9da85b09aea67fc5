//! Idempotency registry port.

use crate::domain::{IdempotencyKey, IdempotencyStatus};
use crate::error::RegistryError;

/// Tracks the lifecycle of idempotency keys.
#[async_trait::async_trait]
pub trait IdempotencyRegistry: Send + Sync + 'static {
    /// Allocates a fresh unique key in `WAITING`.
    async fn issue_key(&self) -> Result<IdempotencyKey, RegistryError>;

    /// Returns the current status of a key.
    async fn status(&self, key: &str) -> Result<IdempotencyStatus, RegistryError>;

    /// Overwrites the status of a key.
    ///
    /// No transition rules are enforced here; callers decide when to move a key.
    async fn transition(&self, key: &str, status: IdempotencyStatus) -> Result<(), RegistryError>;

    /// Atomically observes a key and advances it from `WAITING` to `PROCESSING`.
    ///
    /// This is the request-level mutual-exclusion point: of two concurrent
    /// claims on the same key exactly one succeeds. Any other status is
    /// reported as the matching conflict error and left unchanged.
    async fn claim(&self, key: &str) -> Result<(), RegistryError>;
}
