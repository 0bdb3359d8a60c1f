use chrono::Utc;
use gatepass_core::{CheckoutPersistence, CoreResult};
use gatepass_shared::{CheckoutState, PriceBreakdown, Transaction};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shared checkout state with a single persistence boundary
///
/// Every mutation goes through [`CheckoutStore::commit`], which writes the
/// full snapshot (or removes it when the state is empty).
pub struct CheckoutStore {
    state: RwLock<CheckoutState>,
    persistence: Arc<dyn CheckoutPersistence>,
}

impl CheckoutStore {
    /// Restore the last persisted state, starting empty if it cannot be read
    pub fn hydrate(persistence: Arc<dyn CheckoutPersistence>) -> Self {
        let state = match persistence.load() {
            Ok(Some(state)) => {
                info!(
                    "Restored checkout state (event {:?}, transaction {:?})",
                    state.event_id,
                    state.transaction.as_ref().map(|tx| tx.id)
                );
                state
            }
            Ok(None) => CheckoutState::default(),
            Err(e) => {
                warn!("Could not restore checkout state: {}", e);
                CheckoutState::default()
            }
        };

        Self {
            state: RwLock::new(state),
            persistence,
        }
    }

    pub async fn snapshot(&self) -> CheckoutState {
        self.state.read().await.clone()
    }

    /// The cached transaction, if it is the one asked for
    pub async fn transaction(&self, transaction_id: i64) -> Option<Transaction> {
        self.state
            .read()
            .await
            .transaction
            .as_ref()
            .filter(|tx| tx.id == transaction_id)
            .cloned()
    }

    /// Start checkout for `event_id`, dropping state left by an unrelated one.
    /// Returns whether anything was cleared.
    pub async fn begin(&self, event_id: i64) -> CoreResult<bool> {
        let mut state = self.state.write().await;
        let cleared = !state.is_empty() && state.is_unrelated_to(event_id);
        if cleared || state.is_empty() {
            if cleared {
                info!("Clearing checkout state for event {:?}", state.event_id);
            }
            *state = CheckoutState {
                event_id: Some(event_id),
                ..Default::default()
            };
            self.commit(&mut state)?;
        }
        Ok(cleared)
    }

    pub async fn record_transaction(&self, tx: Transaction, breakdown: PriceBreakdown) -> CoreResult<()> {
        let mut state = self.state.write().await;
        state.event_id = Some(tx.event_id);
        state.transaction = Some(tx);
        state.breakdown = Some(breakdown);
        self.commit(&mut state)
    }

    /// Replace the cached transaction with a fresher server copy
    pub async fn update_transaction(&self, tx: &Transaction) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let same = state.transaction.as_ref().map(|cached| cached.id == tx.id).unwrap_or(false);
        if !same {
            state.breakdown = None;
        }
        state.event_id = Some(tx.event_id);
        state.transaction = Some(tx.clone());
        self.commit(&mut state)
    }

    pub async fn clear(&self) -> CoreResult<()> {
        let mut state = self.state.write().await;
        *state = CheckoutState::default();
        self.commit(&mut state)
    }

    fn commit(&self, state: &mut CheckoutState) -> CoreResult<()> {
        if state.is_empty() {
            return self.persistence.clear();
        }
        state.updated_at = Some(Utc::now());
        self.persistence.save(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gatepass_core::MemoryCheckoutPersistence;
    use gatepass_shared::TransactionStatus;

    fn tx(id: i64, event_id: i64, status: TransactionStatus) -> Transaction {
        let now = Utc::now();
        Transaction {
            id,
            event_id,
            user_id: 1,
            quantity: 2,
            attend_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            payment_method: None,
            voucher_code: None,
            voucher_discount: 0,
            coupon_code: None,
            coupon_discount: 0,
            points_used: 0,
            total_pay_amount: 200_000,
            status,
            payment_proof_url: None,
            tickets: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_state_survives_rehydration() {
        let persistence = Arc::new(MemoryCheckoutPersistence::new());
        let store = CheckoutStore::hydrate(persistence.clone());
        store
            .record_transaction(
                tx(10, 4, TransactionStatus::WaitingForPayment),
                PriceBreakdown::compute(100_000, 2, 0, 0, 0),
            )
            .await
            .unwrap();

        let restored = CheckoutStore::hydrate(persistence);
        let cached = restored.transaction(10).await.unwrap();
        assert_eq!(cached.event_id, 4);
        assert!(restored.transaction(11).await.is_none());
    }

    #[tokio::test]
    async fn test_begin_keeps_related_in_flight_transaction() {
        let store = CheckoutStore::hydrate(Arc::new(MemoryCheckoutPersistence::new()));
        store
            .record_transaction(
                tx(10, 4, TransactionStatus::WaitingForPayment),
                PriceBreakdown::compute(100_000, 2, 0, 0, 0),
            )
            .await
            .unwrap();

        assert!(!store.begin(4).await.unwrap());
        assert!(store.transaction(10).await.is_some());
    }

    #[tokio::test]
    async fn test_begin_clears_unrelated_or_finished_transaction() {
        let store = CheckoutStore::hydrate(Arc::new(MemoryCheckoutPersistence::new()));
        store
            .record_transaction(
                tx(10, 4, TransactionStatus::WaitingForPayment),
                PriceBreakdown::compute(100_000, 2, 0, 0, 0),
            )
            .await
            .unwrap();

        assert!(store.begin(5).await.unwrap());
        assert!(store.transaction(10).await.is_none());
        assert_eq!(store.snapshot().await.event_id, Some(5));

        store.update_transaction(&tx(11, 5, TransactionStatus::Confirmed)).await.unwrap();
        assert!(store.begin(5).await.unwrap());
        assert!(store.snapshot().await.transaction.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_snapshot() {
        let persistence = Arc::new(MemoryCheckoutPersistence::new());
        let store = CheckoutStore::hydrate(persistence.clone());
        store.begin(3).await.unwrap();
        assert!(persistence.raw().is_some());

        store.clear().await.unwrap();
        assert!(persistence.raw().is_none());
    }
}
