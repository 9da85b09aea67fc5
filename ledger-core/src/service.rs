//! Transaction Application Service
//!
//! Orchestrates a credit or debit across the idempotency registry, the
//! transaction store, the settlement gateway and the account ledger.
//! Contains NO transport logic.
//!
//! ## Saga
//!
//! 1. Require an idempotency key.
//! 2. Claim it (`WAITING -> PROCESSING`), rejecting every other status.
//! 3. Decode and validate the payload, check the account exists.
//! 4. Persist a `pending` transaction under a fresh reference.
//! 5. Forward it to the settlement system.
//! 6. Apply the balance change.
//! 7. Mark the transaction `success` and the key `SUCCESS`.
//!
//! Any failure after step 2 marks the key `FAILED`; any failure after step 4
//! also marks the transaction `failed`. Steps 3 to 7 run on a spawned task, so
//! a caller that drops the future does not leave the key `PROCESSING`.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{Instrument, debug, error, info, warn};

use ledger_types::{
    Account, AccountId, AccountLedger, Amount, CreateTransactionRequest, Direction,
    ForwardTransaction, GatewayError, IdempotencyKey, IdempotencyRegistry, IdempotencyStatus,
    LedgerError, NewTransaction, SettlementGateway, Transaction, TransactionReference,
    TransactionStatus, TransactionStore,
};

use crate::reference::ReferenceGenerator;

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upper bound on a single settlement call.
    pub forward_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            forward_timeout: Duration::from_secs(5),
        }
    }
}

/// Per-request metadata supplied by the transport.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Raw idempotency key; blank counts as absent.
    pub idempotency_key: Option<String>,
    /// Caller deadline for the settlement call. The shorter of this and
    /// `ServiceConfig::forward_timeout` wins.
    pub timeout: Option<Duration>,
}

impl RequestContext {
    pub fn new(idempotency_key: impl Into<String>) -> Self {
        Self {
            idempotency_key: Some(idempotency_key.into()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn key(&self) -> Option<&str> {
        self.idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Application service for credit and debit operations.
///
/// Collaborators are trait objects so the same service runs against the
/// in-memory adapters, SQLite, a live settlement endpoint or test doubles.
/// Cloning is cheap: every collaborator is shared.
#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
    ledger: Arc<dyn AccountLedger>,
    gateway: Arc<dyn SettlementGateway>,
    registry: Arc<dyn IdempotencyRegistry>,
    references: ReferenceGenerator,
    config: ServiceConfig,
}

impl TransactionService {
    /// Creates a service with the default reference generator and config.
    pub fn new(
        store: Arc<dyn TransactionStore>,
        ledger: Arc<dyn AccountLedger>,
        gateway: Arc<dyn SettlementGateway>,
        registry: Arc<dyn IdempotencyRegistry>,
    ) -> Self {
        Self {
            store,
            ledger,
            gateway,
            registry,
            references: ReferenceGenerator::new(),
            config: ServiceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reference_generator(mut self, references: ReferenceGenerator) -> Self {
        self.references = references;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Idempotency Keys
    // ─────────────────────────────────────────────────────────────────────────────

    /// Issues a fresh key in `WAITING`.
    #[tracing::instrument(skip(self))]
    pub async fn request_idempotency_key(&self) -> Result<IdempotencyKey, LedgerError> {
        let issued = self.registry.issue_key().await?;
        info!(key = %issued.key, "Issued idempotency key");
        Ok(issued)
    }

    /// Current status of a key.
    pub async fn key_status(&self, key: &str) -> Result<IdempotencyStatus, LedgerError> {
        Ok(self.registry.status(key).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Credit / Debit
    // ─────────────────────────────────────────────────────────────────────────────

    /// Runs the credit saga on a raw JSON body.
    ///
    /// The body is decoded only after the key is claimed, so a malformed
    /// payload consumes the key.
    pub async fn create_credit(
        &self,
        ctx: &RequestContext,
        body: &[u8],
    ) -> Result<Transaction, LedgerError> {
        self.execute(ctx, Direction::Credit, Payload::Raw(body.to_vec()))
            .await
    }

    /// Runs the debit saga on a raw JSON body.
    pub async fn create_debit(
        &self,
        ctx: &RequestContext,
        body: &[u8],
    ) -> Result<Transaction, LedgerError> {
        self.execute(ctx, Direction::Debit, Payload::Raw(body.to_vec()))
            .await
    }

    /// Typed entry point for in-process callers.
    pub async fn credit(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        let request = CreateTransactionRequest { account_id, amount };
        self.execute(ctx, Direction::Credit, Payload::Typed(request))
            .await
    }

    /// Typed entry point for in-process callers.
    pub async fn debit(
        &self,
        ctx: &RequestContext,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Transaction, LedgerError> {
        let request = CreateTransactionRequest { account_id, amount };
        self.execute(ctx, Direction::Debit, Payload::Typed(request))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn get_transaction(
        &self,
        reference: &TransactionReference,
    ) -> Result<Transaction, LedgerError> {
        self.store
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(reference.clone()))
    }

    /// The settlement system's copy of a transaction, for reconciling it
    /// against the local record.
    #[tracing::instrument(skip(self), fields(reference = %reference))]
    pub async fn settlement_record(
        &self,
        reference: &TransactionReference,
    ) -> Result<ForwardTransaction, LedgerError> {
        let found = within(self.config.forward_timeout, self.gateway.lookup(reference)).await?;
        found.ok_or_else(|| LedgerError::TransactionNotFound(reference.clone()))
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.ledger
            .find_account(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Saga
    // ─────────────────────────────────────────────────────────────────────────────

    /// Claims the key, then hands the rest of the saga to its own task.
    ///
    /// Once the key is `PROCESSING` the saga runs to a terminal state even if
    /// the caller stops polling this future.
    #[tracing::instrument(
        skip(self, ctx, payload),
        fields(key = ctx.idempotency_key.as_deref().unwrap_or_default())
    )]
    async fn execute(
        &self,
        ctx: &RequestContext,
        direction: Direction,
        payload: Payload,
    ) -> Result<Transaction, LedgerError> {
        let Some(key) = ctx.key() else {
            warn!("Rejected request without idempotency key");
            return Err(LedgerError::MissingIdempotencyKey);
        };

        if let Err(e) = self.registry.claim(key).await {
            let e = LedgerError::from(e);
            if e.is_key_conflict() {
                warn!("Rejected reused idempotency key: {}", e);
            } else {
                warn!("Rejected request: {}", e);
            }
            return Err(e);
        }

        let saga = self.clone();
        let owned_key = key.to_string();
        let deadline = ctx.timeout;
        let task = tokio::spawn(
            async move { saga.run(&owned_key, direction, payload, deadline).await }
                .in_current_span(),
        );

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Transaction task aborted: {}", e);
                self.mark_key(key, IdempotencyStatus::Failed).await;
                Err(LedgerError::Persistence(format!(
                    "Transaction task aborted: {}",
                    e
                )))
            }
        }
    }

    /// Steps after the claim. Every exit leaves the key terminal.
    async fn run(
        &self,
        key: &str,
        direction: Direction,
        payload: Payload,
        deadline: Option<Duration>,
    ) -> Result<Transaction, LedgerError> {
        let pending = match self.prepare(direction, payload).await {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Transaction rejected before settlement: {}", e);
                self.mark_key(key, IdempotencyStatus::Failed).await;
                return Err(e);
            }
        };

        if let Err(e) = self.settle(&pending, deadline).await {
            if e.is_infrastructure() {
                error!(reference = %pending.reference, "Transaction failed: {}", e);
            } else {
                warn!(reference = %pending.reference, "Transaction failed: {}", e);
            }
            self.mark_transaction(&pending.reference, TransactionStatus::Failed)
                .await;
            self.mark_key(key, IdempotencyStatus::Failed).await;
            return Err(e);
        }

        self.commit(key, &pending).await
    }

    /// Validation, account lookup and the pending record.
    async fn prepare(&self, direction: Direction, payload: Payload) -> Result<Transaction, LedgerError> {
        let request = payload.decode()?;
        let amount = Amount::new(request.amount)?;

        if self.ledger.find_account(request.account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(request.account_id));
        }

        let reference = self.references.generate(self.store.as_ref()).await?;
        let pending = self
            .store
            .create_transaction(NewTransaction {
                reference,
                account_id: request.account_id,
                amount,
                direction,
            })
            .await
            .map_err(|e| LedgerError::Persistence(e.to_string()))?;

        debug!(reference = %pending.reference, account_id = %pending.account_id, amount = %pending.amount, "Created pending transaction");
        Ok(pending)
    }

    /// Forwards the transaction, then moves the balance.
    async fn settle(&self, tx: &Transaction, deadline: Option<Duration>) -> Result<(), LedgerError> {
        let limit = deadline.map_or(self.config.forward_timeout, |d| {
            d.min(self.config.forward_timeout)
        });

        let forward = ForwardTransaction::from(tx);
        within(limit, self.gateway.forward(&forward)).await?;

        let account = match tx.direction {
            Direction::Credit => self.ledger.credit(tx.account_id, tx.amount).await?,
            Direction::Debit => self.ledger.debit(tx.account_id, tx.amount).await?,
        };
        debug!(reference = %tx.reference, balance = %account.balance, "Applied balance change");
        Ok(())
    }

    /// Final bookkeeping once the balance has moved.
    async fn commit(&self, key: &str, tx: &Transaction) -> Result<Transaction, LedgerError> {
        let result = self
            .store
            .update_status(&tx.reference, TransactionStatus::Success)
            .await;

        // The balance has already moved, so the key must not be replayable
        // whatever the store says.
        self.mark_key(key, IdempotencyStatus::Success).await;

        match result {
            Ok(done) => {
                info!(reference = %done.reference, account_id = %done.account_id, amount = %done.amount, "Transaction succeeded");
                Ok(done)
            }
            Err(e) => {
                error!(reference = %tx.reference, "Balance applied but transaction could not be finalized: {}", e);
                Err(LedgerError::Persistence(e.to_string()))
            }
        }
    }

    async fn mark_key(&self, key: &str, status: IdempotencyStatus) {
        if let Err(e) = self.registry.transition(key, status).await {
            error!(key, %status, "Failed to update idempotency key: {}", e);
        }
    }

    async fn mark_transaction(&self, reference: &TransactionReference, status: TransactionStatus) {
        if let Err(e) = self.store.update_status(reference, status).await {
            error!(%reference, %status, "Failed to update transaction status: {}", e);
        }
    }
}

/// Runs a settlement call, turning an elapsed `limit` into `GatewayError::Timeout`.
async fn within<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, LedgerError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(GatewayError::Timeout {
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
        .into()),
    }
}

/// Request body as handed over by the caller.
enum Payload {
    Raw(Vec<u8>),
    Typed(CreateTransactionRequest),
}

impl Payload {
    fn decode(self) -> Result<CreateTransactionRequest, LedgerError> {
        match self {
            Payload::Raw(body) => serde_json::from_slice(&body)
                .map_err(|e| LedgerError::InvalidPayload(e.to_string())),
            Payload::Typed(request) => Ok(request),
        }
    }
}
