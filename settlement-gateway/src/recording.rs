//! In-process settlement adapter.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use ledger_types::{ForwardTransaction, GatewayError, SettlementGateway, TransactionReference};

/// Acknowledges every transaction and keeps a copy, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    forwarded: Mutex<Vec<ForwardTransaction>>,
    failing: bool,
    delay: Option<Duration>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that refuses every transaction.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Waits `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Everything acknowledged so far.
    pub fn forwarded(&self) -> Vec<ForwardTransaction> {
        self.records().clone()
    }

    pub fn find(&self, reference: &TransactionReference) -> Option<ForwardTransaction> {
        self.records()
            .iter()
            .find(|tx| &tx.reference == reference)
            .cloned()
    }

    fn records(&self) -> MutexGuard<'_, Vec<ForwardTransaction>> {
        // A poisoned lock still holds a consistent Vec.
        self.forwarded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SettlementGateway for RecordingGateway {
    async fn forward(&self, tx: &ForwardTransaction) -> Result<(), GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing {
            tracing::warn!(reference = %tx.reference, "Recording gateway refusing transaction");
            return Err(GatewayError::Unavailable(
                "settlement service refused the transaction".into(),
            ));
        }

        tracing::debug!(reference = %tx.reference, account_id = %tx.account_id, amount = %tx.amount, "Recorded forwarded transaction");
        self.records().push(tx.clone());
        Ok(())
    }

    async fn lookup(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<ForwardTransaction>, GatewayError> {
        if self.failing {
            return Err(GatewayError::Unavailable(
                "settlement service is not answering".into(),
            ));
        }
        Ok(self.find(reference))
    }
}

#[cfg(test)]
mod tests {
    use ledger_types::{AccountId, Amount};
    use rust_decimal_macros::dec;

    use super::*;

    fn forward_tx(reference: &str) -> ForwardTransaction {
        ForwardTransaction {
            reference: TransactionReference::new(reference),
            account_id: AccountId::new(1),
            amount: Amount::new(dec!(10)).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_records_in_order() {
        let gateway = RecordingGateway::new();
        gateway.forward(&forward_tx("TRX-a")).await.unwrap();
        gateway.forward(&forward_tx("TRX-b")).await.unwrap();

        let seen: Vec<String> = gateway
            .forwarded()
            .into_iter()
            .map(|tx| tx.reference.to_string())
            .collect();
        assert_eq!(seen, ["TRX-a", "TRX-b"]);

        assert!(gateway.find(&TransactionReference::new("TRX-b")).is_some());
        assert!(gateway.find(&TransactionReference::new("TRX-c")).is_none());

        let found = gateway.lookup(&TransactionReference::new("TRX-a")).await.unwrap();
        assert_eq!(found, Some(forward_tx("TRX-a")));
    }

    #[tokio::test]
    async fn test_failing_records_nothing() {
        let gateway = RecordingGateway::failing();
        let result = gateway.forward(&forward_tx("TRX-a")).await;

        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert!(gateway.forwarded().is_empty());

        let lookup = gateway.lookup(&TransactionReference::new("TRX-a")).await;
        assert!(matches!(lookup, Err(GatewayError::Unavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_applied() {
        let gateway = RecordingGateway::new().with_delay(Duration::from_secs(3));
        let started = tokio::time::Instant::now();

        gateway.forward(&forward_tx("TRX-a")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
