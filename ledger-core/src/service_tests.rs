//! TransactionService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use ledger_repo::InMemoryTransactionStore;
    use ledger_types::{
        Account, AccountId, AccountLedger, Amount, Direction, IdempotencyRegistry,
        IdempotencyStatus, LedgerError, NewTransaction, RepoError, Transaction,
        TransactionReference, TransactionStatus, TransactionStore,
    };
    use settlement_gateway::RecordingGateway;

    use crate::{
        KeyRegistry, Ledger, ReferenceGenerator, RequestContext, ServiceConfig,
        TransactionService,
    };

    /// Store wrapper that can be told to fail specific operations.
    pub struct FlakyStore {
        inner: InMemoryTransactionStore,
        fail_create: AtomicBool,
        fail_success_update: AtomicBool,
    }

    impl FlakyStore {
        pub fn new() -> Self {
            Self {
                inner: InMemoryTransactionStore::new(),
                fail_create: AtomicBool::new(false),
                fail_success_update: AtomicBool::new(false),
            }
        }

        pub fn transactions(&self) -> Vec<Transaction> {
            self.inner.transactions()
        }
    }

    #[async_trait]
    impl TransactionStore for FlakyStore {
        async fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, RepoError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(RepoError::Database("disk full".into()));
            }
            self.inner.create_transaction(new).await
        }

        async fn update_status(
            &self,
            reference: &TransactionReference,
            status: TransactionStatus,
        ) -> Result<Transaction, RepoError> {
            if status == TransactionStatus::Success && self.fail_success_update.load(Ordering::SeqCst)
            {
                return Err(RepoError::Database("connection reset".into()));
            }
            self.inner.update_status(reference, status).await
        }

        async fn find_by_reference(
            &self,
            reference: &TransactionReference,
        ) -> Result<Option<Transaction>, RepoError> {
            self.inner.find_by_reference(reference).await
        }
    }

    struct Harness {
        service: Arc<TransactionService>,
        store: Arc<FlakyStore>,
        ledger: Arc<Ledger>,
        gateway: Arc<RecordingGateway>,
        registry: Arc<KeyRegistry>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_gateway(RecordingGateway::new())
        }

        fn with_gateway(gateway: RecordingGateway) -> Self {
            let store = Arc::new(FlakyStore::new());
            let ledger = Arc::new(
                Ledger::with_accounts([
                    (AccountId::new(1), dec!(1000.00)),
                    (AccountId::new(2), dec!(50.00)),
                    (AccountId::new(3), dec!(400.00)),
                ])
                .unwrap(),
            );
            let gateway = Arc::new(gateway);
            let registry = Arc::new(KeyRegistry::new());

            let service = TransactionService::new(
                store.clone(),
                ledger.clone(),
                gateway.clone(),
                registry.clone(),
            )
            .with_config(ServiceConfig {
                forward_timeout: Duration::from_secs(2),
            });

            Self {
                service: Arc::new(service),
                store,
                ledger,
                gateway,
                registry,
            }
        }

        async fn key(&self) -> String {
            self.service.request_idempotency_key().await.unwrap().key
        }

        async fn balance(&self, id: u64) -> Decimal {
            self.ledger
                .find_account(AccountId::new(id))
                .await
                .unwrap()
                .unwrap()
                .balance
        }

        async fn key_status(&self, key: &str) -> IdempotencyStatus {
            self.registry.status(key).await.unwrap()
        }

        /// Waits for a key to reach SUCCESS or FAILED.
        async fn settled_status(&self, key: &str) -> IdempotencyStatus {
            for _ in 0..200 {
                let status = self.key_status(key).await;
                if status.is_terminal() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("key {key} never settled");
        }
    }

    /// Ledger whose backing storage is unreachable.
    struct OfflineLedger;

    #[async_trait]
    impl AccountLedger for OfflineLedger {
        async fn find_account(&self, _id: AccountId) -> Result<Option<Account>, RepoError> {
            Err(RepoError::Database("ledger offline".into()))
        }

        async fn credit(&self, _id: AccountId, _amount: Amount) -> Result<Account, RepoError> {
            Err(RepoError::Database("ledger offline".into()))
        }

        async fn debit(&self, _id: AccountId, _amount: Amount) -> Result<Account, RepoError> {
            Err(RepoError::Database("ledger offline".into()))
        }
    }

    fn ctx(key: &str) -> RequestContext {
        RequestContext::new(key)
    }

    fn body(account_id: u64, amount: &str) -> Vec<u8> {
        format!(r#"{{"account_id": {}, "amount": "{}"}}"#, account_id, amount).into_bytes()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Happy paths
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_credit_success() {
        let h = Harness::new();
        let key = h.key().await;

        let tx = h
            .service
            .create_credit(&RequestContext::new(&key), &body(1, "100.00"))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(tx.amount.value(), dec!(100.00));
        assert!(tx.reference.as_str().starts_with("TRX-"));
        assert_eq!(h.balance(1).await, dec!(1100.00));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Success);

        let forwarded = h.gateway.forwarded();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].reference, tx.reference);
        assert_eq!(forwarded[0].account_id, AccountId::new(1));
    }

    #[tokio::test]
    async fn test_debit_success() {
        let h = Harness::new();
        let key = h.key().await;

        let tx = h
            .service
            .debit(&ctx(&key), AccountId::new(3), dec!(150.50))
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(h.balance(3).await, dec!(249.50));

        let stored = h.service.get_transaction(&tx.reference).await.unwrap();
        assert_eq!(stored, tx);
    }

    #[tokio::test]
    async fn test_numeric_json_amount_accepted() {
        let h = Harness::new();
        let key = h.key().await;

        let tx = h
            .service
            .create_credit(
                &RequestContext::new(&key),
                br#"{"account_id": 3, "amount": 12.5}"#,
            )
            .await
            .unwrap();

        assert_eq!(tx.amount.to_string(), "12.50");
        assert_eq!(h.balance(3).await, dec!(412.50));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Idempotency
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_replay_after_success_is_rejected() {
        let h = Harness::new();
        let key = h.key().await;
        let ctx = RequestContext::new(&key);

        h.service.create_credit(&ctx, &body(1, "100.00")).await.unwrap();
        let replay = h.service.create_credit(&ctx, &body(1, "100.00")).await;

        assert!(matches!(replay, Err(LedgerError::KeyAlreadySucceeded(_))));
        assert_eq!(h.balance(1).await, dec!(1100.00));
        assert_eq!(h.store.transactions().len(), 1);
        assert_eq!(h.gateway.forwarded().len(), 1);
    }

    #[tokio::test]
    async fn test_replay_across_directions_is_rejected() {
        let h = Harness::new();
        let key = h.key().await;

        h.service.credit(&ctx(&key), AccountId::new(1), dec!(5)).await.unwrap();
        let result = h.service.debit(&ctx(&key), AccountId::new(1), dec!(5)).await;

        assert!(matches!(result, Err(LedgerError::KeyAlreadySucceeded(_))));
        assert_eq!(h.balance(1).await, dec!(1005.00));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let h = Harness::new();

        let result = h
            .service
            .create_credit(&RequestContext::default(), &body(1, "10"))
            .await;
        assert!(matches!(result, Err(LedgerError::MissingIdempotencyKey)));

        let result = h
            .service
            .create_debit(&RequestContext::new("   "), &body(1, "10"))
            .await;
        assert!(matches!(result, Err(LedgerError::MissingIdempotencyKey)));

        assert!(h.store.transactions().is_empty());
        assert_eq!(h.balance(1).await, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let h = Harness::new();

        let result = h
            .service
            .create_credit(&RequestContext::new("never-issued"), &body(1, "10"))
            .await;

        assert!(matches!(result, Err(LedgerError::UnknownKey(k)) if k == "never-issued"));
        assert!(h.store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_failed_key_cannot_be_reused() {
        let h = Harness::new();
        let key = h.key().await;

        let first = h.service.debit(&ctx(&key), AccountId::new(2), dec!(100)).await;
        assert!(matches!(first, Err(LedgerError::InsufficientFunds { .. })));

        let retry = h.service.debit(&ctx(&key), AccountId::new(2), dec!(10)).await;
        assert!(matches!(retry, Err(LedgerError::KeyPreviouslyFailed(_))));
        assert_eq!(h.balance(2).await, dec!(50.00));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_with_same_key_apply_once() {
        let h = Harness::with_gateway(RecordingGateway::new().with_delay(Duration::from_millis(100)));
        let key = h.key().await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&h.service);
                let ctx = RequestContext::new(&key);
                tokio::spawn(async move { service.create_credit(&ctx, &body(1, "100.00")).await })
            })
            .collect();

        let mut ok = 0;
        let mut in_processing = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(LedgerError::KeyInProcessing(_)) => in_processing += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!((ok, in_processing), (1, 1));
        assert_eq!(h.balance(1).await, dec!(1100.00));
        assert_eq!(h.store.transactions().len(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Failures before settlement
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_malformed_payload_consumes_key() {
        let h = Harness::new();
        let key = h.key().await;

        let result = h
            .service
            .create_credit(&RequestContext::new(&key), b"{not json")
            .await;

        assert!(matches!(result, Err(LedgerError::InvalidPayload(_))));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);
        assert!(h.store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_missing_field_is_invalid_payload() {
        let h = Harness::new();
        let key = h.key().await;

        let result = h
            .service
            .create_debit(&RequestContext::new(&key), br#"{"account_id": 1}"#)
            .await;

        assert!(matches!(result, Err(LedgerError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_invalid() {
        let h = Harness::new();

        for amount in ["0", "-5.00"] {
            let key = h.key().await;
            let result = h
                .service
                .create_credit(&RequestContext::new(&key), &body(1, amount))
                .await;

            assert!(matches!(result, Err(LedgerError::InvalidAmount(_))), "{amount}");
            assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);
        }
        assert!(h.store.transactions().is_empty());
        assert!(h.gateway.forwarded().is_empty());
    }

    #[tokio::test]
    async fn test_sub_cent_amount_is_invalid() {
        let h = Harness::new();
        let key = h.key().await;

        let result = h.service.credit(&ctx(&key), AccountId::new(1), dec!(0.001)).await;

        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
        assert_eq!(h.balance(1).await, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let h = Harness::new();
        let key = h.key().await;

        let result = h.service.credit(&ctx(&key), AccountId::new(99), dec!(10)).await;

        assert!(matches!(result, Err(LedgerError::AccountNotFound(id)) if id == AccountId::new(99)));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);
        assert!(h.store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_on_create_fails_key() {
        for debit in [false, true] {
            let h = Harness::new();
            h.store.fail_create.store(true, Ordering::SeqCst);
            let key = h.key().await;

            let result = if debit {
                h.service.debit(&ctx(&key), AccountId::new(1), dec!(10)).await
            } else {
                h.service.credit(&ctx(&key), AccountId::new(1), dec!(10)).await
            };

            assert!(matches!(result, Err(LedgerError::Persistence(_))));
            assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);
            assert!(h.gateway.forwarded().is_empty());
            assert_eq!(h.balance(1).await, dec!(1000.00));
        }
    }

    #[tokio::test]
    async fn test_account_lookup_failure_is_persistence_error() {
        let h = Harness::new();
        let service = TransactionService::new(
            h.store.clone(),
            Arc::new(OfflineLedger),
            h.gateway.clone(),
            h.registry.clone(),
        );
        let key = h.key().await;

        let result = service.credit(&ctx(&key), AccountId::new(1), dec!(10)).await;

        assert!(matches!(result, Err(LedgerError::Persistence(msg)) if msg.contains("ledger offline")));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);
        assert!(h.store.transactions().is_empty());
        assert!(h.gateway.forwarded().is_empty());
    }

    #[tokio::test]
    async fn test_reference_exhaustion_fails_key() {
        let h = Harness::new();
        h.store
            .inner
            .create_transaction(NewTransaction {
                reference: TransactionReference::new("TRX-taken"),
                account_id: AccountId::new(1),
                amount: Amount::new(dec!(1.00)).unwrap(),
                direction: Direction::Credit,
            })
            .await
            .unwrap();

        let service = (*h.service)
            .clone()
            .with_reference_generator(ReferenceGenerator::with_source(2, || {
                TransactionReference::new("TRX-taken")
            }));
        let key = h.key().await;

        let result = service.debit(&ctx(&key), AccountId::new(3), dec!(10)).await;

        assert!(matches!(result, Err(LedgerError::ReferenceExhausted { attempts: 2 })));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);
        assert!(h.gateway.forwarded().is_empty());
        assert_eq!(h.store.transactions().len(), 1);
        assert_eq!(h.balance(3).await, dec!(400.00));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Failures after the pending record exists
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_insufficient_funds_fails_transaction() {
        let h = Harness::new();
        let key = h.key().await;

        let result = h.service.debit(&ctx(&key), AccountId::new(2), dec!(100.00)).await;

        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { available, requested })
                if available == dec!(50.00) && requested == dec!(100.00)
        ));
        assert_eq!(h.balance(2).await, dec!(50.00));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);

        let forwarded = h.gateway.forwarded();
        assert_eq!(forwarded.len(), 1);
        let stored = h.service.get_transaction(&forwarded[0].reference).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_balance_untouched() {
        let h = Harness::with_gateway(RecordingGateway::failing());
        let key = h.key().await;

        let result = h.service.credit(&ctx(&key), AccountId::new(1), dec!(100)).await;

        assert!(matches!(result, Err(LedgerError::ExternalForwarding(_))));
        assert_eq!(h.balance(1).await, dec!(1000.00));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);

        let transactions = h.store.transactions();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_caller_timeout_bounds_forwarding() {
        let h = Harness::with_gateway(RecordingGateway::new().with_delay(Duration::from_millis(500)));
        let key = h.key().await;
        let ctx = RequestContext::new(&key).with_timeout(Duration::from_millis(20));

        let result = h.service.create_credit(&ctx, &body(1, "10.00")).await;

        assert!(matches!(result, Err(LedgerError::ExternalForwarding(_))));
        assert_eq!(h.balance(1).await, dec!(1000.00));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Failed);
        assert_eq!(h.store.transactions()[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_finalize_failure_still_retires_key() {
        let h = Harness::new();
        h.store.fail_success_update.store(true, Ordering::SeqCst);
        let key = h.key().await;

        let result = h.service.credit(&ctx(&key), AccountId::new(1), dec!(10)).await;

        assert!(matches!(result, Err(LedgerError::Persistence(_))));
        assert_eq!(h.balance(1).await, dec!(1010.00));
        assert_eq!(h.key_status(&key).await, IdempotencyStatus::Success);

        let replay = h.service.credit(&ctx(&key), AccountId::new(1), dec!(10)).await;
        assert!(matches!(replay, Err(LedgerError::KeyAlreadySucceeded(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Abandoned calls
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_abandoned_call_still_settles() {
        let h = Harness::with_gateway(RecordingGateway::new().with_delay(Duration::from_millis(200)));
        let key = h.key().await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            h.service.credit(&ctx(&key), AccountId::new(1), dec!(100)),
        )
        .await;
        assert!(abandoned.is_err());

        assert_eq!(h.settled_status(&key).await, IdempotencyStatus::Success);
        assert_eq!(h.balance(1).await, dec!(1100.00));
        assert_eq!(h.store.transactions()[0].status, TransactionStatus::Success);

        let retry = h.service.credit(&ctx(&key), AccountId::new(1), dec!(100)).await;
        assert!(matches!(retry, Err(LedgerError::KeyAlreadySucceeded(_))));
        assert_eq!(h.balance(1).await, dec!(1100.00));
    }

    #[tokio::test]
    async fn test_abandoned_call_past_its_deadline_fails_cleanly() {
        let h = Harness::with_gateway(RecordingGateway::new().with_delay(Duration::from_millis(500)));
        let key = h.key().await;
        let request = ctx(&key).with_timeout(Duration::from_millis(50));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            h.service.debit(&request, AccountId::new(3), dec!(10)),
        )
        .await;
        assert!(abandoned.is_err());

        assert_eq!(h.settled_status(&key).await, IdempotencyStatus::Failed);
        assert_eq!(h.store.transactions()[0].status, TransactionStatus::Failed);
        assert_eq!(h.balance(3).await, dec!(400.00));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries and sequences
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_queries() {
        let h = Harness::new();

        let account = h.service.get_account(AccountId::new(3)).await.unwrap();
        assert_eq!(account.balance, dec!(400.00));

        assert!(matches!(
            h.service.get_account(AccountId::new(7)).await,
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            h.service.get_transaction(&TransactionReference::new("TRX-0-0")).await,
            Err(LedgerError::TransactionNotFound(_))
        ));
        assert!(matches!(
            h.service.key_status("missing").await,
            Err(LedgerError::UnknownKey(_))
        ));
    }

    #[tokio::test]
    async fn test_settlement_record_matches_local_transaction() {
        let h = Harness::new();
        let key = h.key().await;

        let tx = h
            .service
            .credit(&ctx(&key), AccountId::new(1), dec!(42.10))
            .await
            .unwrap();

        let record = h.service.settlement_record(&tx.reference).await.unwrap();
        assert_eq!(record.reference, tx.reference);
        assert_eq!(record.account_id, tx.account_id);
        assert_eq!(record.amount, tx.amount);

        assert!(matches!(
            h.service
                .settlement_record(&TransactionReference::new("TRX-0-0"))
                .await,
            Err(LedgerError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_settlement_record_when_settlement_is_down() {
        let h = Harness::with_gateway(RecordingGateway::failing());

        let result = h
            .service
            .settlement_record(&TransactionReference::new("TRX-1-1"))
            .await;
        assert!(matches!(result, Err(LedgerError::ExternalForwarding(_))));
    }

    #[tokio::test]
    async fn test_sequence_matches_running_total() {
        let h = Harness::new();
        let ops = [
            (true, dec!(25.00)),
            (false, dec!(300.00)),
            (false, dec!(200.00)),
            (true, dec!(0.01)),
            (false, dec!(125.01)),
        ];

        let mut expected = dec!(400.00);
        for (is_credit, amount) in ops {
            let key = h.key().await;
            let result = if is_credit {
                h.service.credit(&ctx(&key), AccountId::new(3), amount).await
            } else {
                h.service.debit(&ctx(&key), AccountId::new(3), amount).await
            };

            if is_credit {
                expected += amount;
                assert!(result.is_ok());
            } else if expected >= amount {
                expected -= amount;
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
            }
            assert_eq!(h.balance(3).await, expected);
        }

        let succeeded = h
            .store
            .transactions()
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Success)
            .count();
        assert_eq!(succeeded, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_with_distinct_keys_never_overdraw() {
        let h = Harness::new();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let key = h.key().await;
            let service = Arc::clone(&h.service);
            handles.push(tokio::spawn(async move {
                service.debit(&ctx(&key), AccountId::new(3), dec!(25.00)).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientFunds { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, 16);
        assert_eq!(h.balance(3).await, Decimal::ZERO);
    }
}
