use gatepass_core::{BackendError, Clock, StorefrontBackend};
use gatepass_shared::{
    Event, ProofUpload, Route, StatusChangedEvent, Ticket, Transaction, TransactionStatus,
};
use gatepass_store::app_config::CheckoutRules;
use gatepass_store::CheckoutStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::countdown::Countdown;
use crate::lifecycle::StatusTracker;
use crate::polling::PollPolicy;
use crate::{CheckoutError, CheckoutResult};

/// Payment proof upload progress. `Failed` is local only, the backend
/// status is unchanged by a failed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    Uploaded,
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Server(TransactionStatus),
    UploadFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    Terminal(TransactionStatus),
    Navigated,
    AttemptsExhausted,
    Failed(String),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Unchanged,
    Changed(StatusChangedEvent),
    Navigate(Route),
    Stop(TransactionStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ConfirmationEvent {
    Loaded(Transaction),
    Tick { countdown: Option<String> },
    StatusChanged(StatusChangedEvent),
    TicketsIssued(Vec<Ticket>),
    UploadFailed(String),
    Navigate(Route),
    PollingStopped(StopReason),
}

const EVENT_CAPACITY: usize = 256;

/// Drives the payment page of a single transaction: countdown, proof
/// upload, status polling and free ticket issuance.
pub struct PaymentConfirmation {
    transaction_id: i64,
    backend: Arc<dyn StorefrontBackend>,
    store: Arc<CheckoutStore>,
    clock: Arc<dyn Clock>,
    rules: CheckoutRules,
    policy: PollPolicy,
    tick: Duration,
    tracker: StatusTracker,
    transaction: Option<Transaction>,
    event: Option<Event>,
    upload: UploadState,
    error: Option<String>,
    free_tickets_requested: bool,
    manual_polling: bool,
    navigated: bool,
    events: broadcast::Sender<ConfirmationEvent>,
}

impl PaymentConfirmation {
    pub fn new(
        transaction_id: i64,
        backend: Arc<dyn StorefrontBackend>,
        store: Arc<CheckoutStore>,
        clock: Arc<dyn Clock>,
        rules: CheckoutRules,
        policy: PollPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transaction_id,
            backend,
            store,
            clock,
            rules,
            policy,
            tick: Duration::from_secs(1),
            tracker: StatusTracker::new(transaction_id),
            transaction: None,
            event: None,
            upload: UploadState::Idle,
            error: None,
            free_tickets_requested: false,
            manual_polling: false,
            navigated: false,
            events,
        }
    }

    /// Countdown refresh period
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfirmationEvent> {
        self.events.subscribe()
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }

    pub fn upload_state(&self) -> &UploadState {
        &self.upload
    }

    /// Last error worth showing to the user
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn route(&self) -> Option<Route> {
        self.navigated.then_some(Route::PaymentSuccess {
            transaction_id: self.transaction_id,
        })
    }

    /// Fetch the transaction and its event. A cached copy is trusted as is
    /// only once it is terminal, otherwise it stands in for the server copy
    /// when the backend cannot be reached.
    pub async fn load(&mut self) -> CheckoutResult<()> {
        let cached = self.store.transaction(self.transaction_id).await;
        let tx = match cached {
            Some(tx) if tx.status.is_terminal() => tx,
            cached => match self.backend.get_transaction(self.transaction_id).await {
                Ok(tx) => {
                    if let Err(e) = self.store.update_transaction(&tx).await {
                        warn!("Could not cache transaction {}: {}", tx.id, e);
                    }
                    tx
                }
                Err(BackendError::Transport(reason)) if cached.is_some() => {
                    warn!(
                        "Backend unreachable, using cached transaction {}: {}",
                        self.transaction_id, reason
                    );
                    cached.ok_or(CheckoutError::NotLoaded)?
                }
                Err(e) => {
                    error!("Failed to load transaction {}: {}", self.transaction_id, e);
                    self.error = Some(e.user_message());
                    return Err(e.into());
                }
            },
        };

        let event = match self.backend.get_event(tx.event_id).await {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to load event {} for transaction {}: {}", tx.event_id, tx.id, e);
                self.error = Some(e.user_message());
                return Err(e.into());
            }
        };

        info!("Loaded transaction {} ({})", tx.id, tx.status);
        self.tracker.observe(tx.status, self.clock.now());
        self.event = Some(event);
        self.transaction = Some(tx.clone());
        self.error = None;
        let _ = self.events.send(ConfirmationEvent::Loaded(tx));

        if let Err(e) = self.ensure_free_tickets().await {
            warn!("Free tickets for transaction {} not issued: {}", self.transaction_id, e);
        }
        if self.status() == Some(TransactionStatus::Confirmed) {
            self.navigate_to_success();
        }
        Ok(())
    }

    /// Issue tickets for a free confirmed transaction. Runs at most once per
    /// controller, even if the first attempt fails.
    pub async fn ensure_free_tickets(&mut self) -> CheckoutResult<Option<Vec<Ticket>>> {
        let needed = self
            .transaction
            .as_ref()
            .map(|tx| tx.needs_free_tickets())
            .unwrap_or(false);
        if self.free_tickets_requested || !needed {
            return Ok(None);
        }
        self.free_tickets_requested = true;

        let tickets = match self.backend.generate_free_tickets(self.transaction_id).await {
            Ok(tickets) => tickets,
            Err(e) => {
                error!("Generating free tickets for transaction {} failed: {}", self.transaction_id, e);
                self.error = Some(e.user_message());
                return Err(e.into());
            }
        };

        info!("Issued {} free tickets for transaction {}", tickets.len(), self.transaction_id);
        if let Some(tx) = self.transaction.as_mut() {
            tx.tickets = tickets.clone();
            if let Err(e) = self.store.update_transaction(tx).await {
                warn!("Could not cache tickets for transaction {}: {}", tx.id, e);
            }
        }
        let _ = self.events.send(ConfirmationEvent::TicketsIssued(tickets.clone()));
        Ok(Some(tickets))
    }

    pub fn status(&self) -> Option<TransactionStatus> {
        self.transaction.as_ref().map(|tx| tx.status)
    }

    pub fn display_status(&self) -> Option<DisplayStatus> {
        if matches!(self.upload, UploadState::Failed { .. }) {
            return Some(DisplayStatus::UploadFailed);
        }
        self.status().map(DisplayStatus::Server)
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.transaction
            .as_ref()
            .and_then(|tx| Countdown::for_transaction(tx, &self.rules))
    }

    pub fn countdown_text(&self) -> Option<String> {
        self.countdown().map(|c| c.render(self.clock.now()))
    }

    pub fn can_upload(&self) -> bool {
        self.status().map(|s| s.accepts_payment_proof()).unwrap_or(false)
            && self.upload != UploadState::Uploading
    }

    /// Send the payment proof. A failure leaves the transaction untouched
    /// and can be retried by calling this again.
    pub async fn upload_proof(&mut self, proof: &ProofUpload) -> CheckoutResult<Transaction> {
        let status = self.status().ok_or(CheckoutError::NotLoaded)?;
        if !status.accepts_payment_proof() {
            warn!("Refusing proof upload for transaction {} in {}", self.transaction_id, status);
            return Err(CheckoutError::UploadNotAllowed(status));
        }

        self.upload = UploadState::Uploading;
        info!(
            "Uploading {} ({} bytes) for transaction {}",
            proof.file_name,
            proof.bytes.len(),
            self.transaction_id
        );

        match self.backend.upload_payment_proof(self.transaction_id, proof).await {
            Ok(tx) => {
                self.upload = UploadState::Uploaded;
                self.error = None;
                self.apply_update(tx.clone()).await;
                Ok(tx)
            }
            Err(e) => {
                let message = e.user_message();
                error!("Proof upload for transaction {} failed: {}", self.transaction_id, e);
                self.upload = UploadState::Failed {
                    message: message.clone(),
                };
                self.error = Some(message.clone());
                let _ = self.events.send(ConfirmationEvent::UploadFailed(message));
                Err(e.into())
            }
        }
    }

    /// Poll regardless of status while the transaction is still open
    pub fn set_manual_polling(&mut self, enabled: bool) {
        self.manual_polling = enabled;
    }

    pub fn should_poll(&self) -> bool {
        if self.navigated {
            return false;
        }
        match self.status() {
            Some(status) if status.is_terminal() => false,
            Some(TransactionStatus::WaitingForAdminConfirmation) => true,
            Some(_) => self.manual_polling,
            None => false,
        }
    }

    pub async fn poll_once(&mut self) -> CheckoutResult<PollOutcome> {
        if self.transaction.is_none() {
            return Err(CheckoutError::NotLoaded);
        }

        let tx = self.backend.get_transaction(self.transaction_id).await?;
        let changed = self.apply_update(tx).await;
        if let Err(e) = self.ensure_free_tickets().await {
            warn!("Free tickets for transaction {} not issued: {}", self.transaction_id, e);
        }

        match self.status() {
            Some(TransactionStatus::Confirmed) => Ok(self.navigate_to_success()),
            Some(status) if status.is_terminal() => Ok(PollOutcome::Stop(status)),
            _ => Ok(changed.map(PollOutcome::Changed).unwrap_or(PollOutcome::Unchanged)),
        }
    }

    /// Tick the countdown and poll until the transaction settles, polling
    /// gives up, or `shutdown` flips to true.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> StopReason {
        let reason = self.run_loop(&mut shutdown).await;
        let seen: Vec<String> = self.tracker.history().iter().map(|(status, _)| status.to_string()).collect();
        info!(
            "Stopped watching transaction {}: {:?} (seen {})",
            self.transaction_id,
            reason,
            seen.join(" -> ")
        );
        let _ = self.events.send(ConfirmationEvent::PollingStopped(reason.clone()));
        reason
    }

    async fn run_loop(&mut self, shutdown: &mut watch::Receiver<bool>) -> StopReason {
        let status = match self.status() {
            Some(status) => status,
            None => {
                let message = self
                    .error
                    .clone()
                    .unwrap_or_else(|| CheckoutError::NotLoaded.to_string());
                return StopReason::Failed(message);
            }
        };
        if self.navigated {
            return StopReason::Navigated;
        }
        if status.is_terminal() {
            return StopReason::Terminal(status);
        }

        let mut rng = StdRng::from_entropy();
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts: u32 = 0;
        let mut failures: u32 = 0;
        let mut next_poll = Instant::now() + self.policy.delay_after(0, &mut rng);

        loop {
            let polling = self.should_poll();

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return StopReason::Shutdown;
                    }
                }
                _ = ticker.tick() => {
                    let countdown = self.countdown_text();
                    let _ = self.events.send(ConfirmationEvent::Tick { countdown });
                }
                _ = sleep_until(next_poll), if polling => {
                    attempts += 1;
                    match self.poll_once().await {
                        Ok(PollOutcome::Navigate(_)) => return StopReason::Navigated,
                        Ok(PollOutcome::Stop(status)) => return StopReason::Terminal(status),
                        Ok(_) => failures = 0,
                        Err(e) => {
                            failures += 1;
                            warn!(
                                "Status poll {} for transaction {} failed ({} in a row): {}",
                                attempts, self.transaction_id, failures, e
                            );
                            if self.policy.failures_exhausted(failures) {
                                let message = match &e {
                                    CheckoutError::Backend(b) => b.user_message(),
                                    other => other.to_string(),
                                };
                                self.error = Some(message.clone());
                                return StopReason::Failed(message);
                            }
                        }
                    }
                    if self.policy.attempts_exhausted(attempts) {
                        return StopReason::AttemptsExhausted;
                    }
                    next_poll = Instant::now() + self.policy.delay_after(failures, &mut rng);
                }
            }
        }
    }

    /// Adopt a fresher server copy. Returns the status change, if any.
    async fn apply_update(&mut self, tx: Transaction) -> Option<StatusChangedEvent> {
        let observed_at = self.clock.now();
        let observation = self.tracker.observe(tx.status, observed_at);

        if let Err(e) = self.store.update_transaction(&tx).await {
            warn!("Could not cache transaction {}: {}", tx.id, e);
        }
        if !tx.status.accepts_payment_proof() && matches!(self.upload, UploadState::Failed { .. }) {
            self.upload = UploadState::Idle;
        }
        let previous = self.transaction.replace(tx).map(|old| old.status);

        let to = self.status()?;
        let from = previous?;
        if !observation.is_change() || from == to {
            return None;
        }

        let event = StatusChangedEvent {
            transaction_id: self.transaction_id,
            from,
            to,
            observed_at,
        };
        let _ = self.events.send(ConfirmationEvent::StatusChanged(event.clone()));
        Some(event)
    }

    fn navigate_to_success(&mut self) -> PollOutcome {
        let route = Route::PaymentSuccess {
            transaction_id: self.transaction_id,
        };
        if !self.navigated {
            info!("Transaction {} confirmed, navigating to {}", self.transaction_id, route.path());
            self.navigated = true;
            let _ = self.events.send(ConfirmationEvent::Navigate(route.clone()));
        }
        PollOutcome::Navigate(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use gatepass_core::{ManualClock, MemoryCheckoutPersistence, MockBackend};
    use gatepass_shared::PriceBreakdown;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap()
    }

    fn event(price: i64) -> Event {
        Event {
            id: 5,
            name: "Jazz Night".to_string(),
            description: None,
            category: None,
            price,
            total_seats: 200,
            remaining_seats: 40,
            start_date: Utc.with_ymd_and_hms(2026, 11, 20, 12, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2026, 11, 21, 15, 0, 0).unwrap(),
            location_id: None,
            organizer_id: None,
            section_id: None,
            image_url: None,
        }
    }

    fn tx(status: TransactionStatus, total: i64) -> Transaction {
        Transaction {
            id: 77,
            event_id: 5,
            user_id: 1,
            quantity: 2,
            attend_date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
            payment_method: None,
            voucher_code: None,
            voucher_discount: 0,
            coupon_code: None,
            coupon_discount: 0,
            points_used: 0,
            total_pay_amount: total,
            status,
            payment_proof_url: None,
            tickets: Vec::new(),
            created_at: t0(),
            updated_at: t0(),
        }
    }

    struct Harness {
        backend: Arc<MockBackend>,
        store: Arc<CheckoutStore>,
        clock: ManualClock,
    }

    impl Harness {
        fn new(price: i64) -> Self {
            Self {
                backend: Arc::new(MockBackend::new().with_event(event(price))),
                store: Arc::new(CheckoutStore::hydrate(Arc::new(MemoryCheckoutPersistence::new()))),
                clock: ManualClock::new(t0()),
            }
        }

        fn controller(&self) -> PaymentConfirmation {
            PaymentConfirmation::new(
                77,
                self.backend.clone(),
                self.store.clone(),
                Arc::new(self.clock.clone()),
                CheckoutRules::default(),
                PollPolicy::default(),
            )
        }
    }

    fn drain(rx: &mut broadcast::Receiver<ConfirmationEvent>) -> Vec<ConfirmationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_confirmation_is_polled_every_twenty_seconds() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForAdminConfirmation, 200_000));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert!(controller.should_poll());
        assert_eq!(h.backend.calls("get_transaction"), 1);

        let (stop, shutdown) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let reason = controller.run(shutdown).await;
            (controller, reason)
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(h.backend.calls("get_transaction"), 4);

        stop.send(true).unwrap();
        let (_, reason) = handle.await.unwrap();
        assert_eq!(reason, StopReason::Shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_navigates_and_stops_polling() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForAdminConfirmation, 200_000));
        h.backend.push_transaction(tx(TransactionStatus::WaitingForAdminConfirmation, 200_000));
        h.backend.push_transaction(tx(TransactionStatus::Confirmed, 200_000));

        let mut controller = h.controller();
        let mut events = controller.subscribe();
        controller.load().await.unwrap();

        let (_stop, shutdown) = watch::channel(false);
        let reason = controller.run(shutdown).await;
        assert_eq!(reason, StopReason::Navigated);
        assert_eq!(controller.route(), Some(Route::PaymentSuccess { transaction_id: 77 }));

        let calls = h.backend.calls("get_transaction");
        assert_eq!(calls, 3);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.backend.calls("get_transaction"), calls);

        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(
            e,
            ConfirmationEvent::StatusChanged(change) if change.to == TransactionStatus::Confirmed
        )));
        assert!(events.contains(&ConfirmationEvent::Navigate(Route::PaymentSuccess { transaction_id: 77 })));
        assert_eq!(
            h.store.transaction(77).await.map(|tx| tx.status),
            Some(TransactionStatus::Confirmed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_for_payment_is_not_polled_unless_asked() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForPayment, 200_000));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert!(!controller.should_poll());
        controller.set_manual_polling(true);
        assert!(controller.should_poll());
        controller.set_manual_polling(false);

        let (stop, shutdown) = watch::channel(false);
        let handle = tokio::spawn(async move { controller.run(shutdown).await });
        tokio::time::sleep(Duration::from_secs(90)).await;
        stop.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), StopReason::Shutdown);
        assert_eq!(h.backend.calls("get_transaction"), 1);
    }

    #[tokio::test]
    async fn test_free_tickets_are_generated_once() {
        let h = Harness::new(0);
        h.backend.push_transaction(tx(TransactionStatus::Confirmed, 0));

        let mut controller = h.controller();
        let mut events = controller.subscribe();
        controller.load().await.unwrap();

        assert_eq!(h.backend.calls("generate_free_tickets"), 1);
        assert_eq!(controller.transaction().map(|tx| tx.tickets.len()), Some(2));
        assert!(controller.ensure_free_tickets().await.unwrap().is_none());
        assert_eq!(h.backend.calls("generate_free_tickets"), 1);

        let events = drain(&mut events);
        assert!(events.iter().any(|e| matches!(e, ConfirmationEvent::TicketsIssued(t) if t.len() == 2)));
        assert_eq!(controller.route(), Some(Route::PaymentSuccess { transaction_id: 77 }));
    }

    #[tokio::test]
    async fn test_free_ticket_guard_holds_after_failure() {
        let h = Harness::new(0);
        h.backend.push_transaction(tx(TransactionStatus::Confirmed, 0));
        h.backend.fail_free_tickets_with(BackendError::Transport("timed out".to_string()));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert!(controller.error().is_some());

        assert!(controller.ensure_free_tickets().await.unwrap().is_none());
        assert!(controller.poll_once().await.is_ok());
        assert_eq!(h.backend.calls("generate_free_tickets"), 1);
    }

    #[tokio::test]
    async fn test_paid_transaction_never_requests_free_tickets() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::Confirmed, 200_000));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert_eq!(h.backend.calls("generate_free_tickets"), 0);
    }

    #[tokio::test]
    async fn test_upload_moves_to_admin_confirmation() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForPayment, 200_000));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert!(controller.can_upload());
        assert_eq!(controller.countdown_text().as_deref(), Some("02:00:00"));

        let proof = ProofUpload::from_file_name("receipt.png", vec![1, 2, 3]);
        let updated = controller.upload_proof(&proof).await.unwrap();
        assert_eq!(updated.status, TransactionStatus::WaitingForAdminConfirmation);
        assert_eq!(controller.upload_state(), &UploadState::Uploaded);
        assert!(controller.should_poll());
        assert!(!controller.can_upload());
    }

    #[tokio::test]
    async fn test_upload_gated_by_status() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForAdminConfirmation, 200_000));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert!(!controller.can_upload());

        let proof = ProofUpload::from_file_name("receipt.png", vec![1, 2, 3]);
        let err = controller.upload_proof(&proof).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::UploadNotAllowed(TransactionStatus::WaitingForAdminConfirmation)
        ));
        assert_eq!(h.backend.calls("upload_payment_proof"), 0);
    }

    #[tokio::test]
    async fn test_failed_upload_is_local_and_retryable() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForPayment, 200_000));
        h.backend.fail_uploads_with(BackendError::Rejected {
            status: 413,
            message: "File too large".to_string(),
        });

        let mut controller = h.controller();
        let mut events = controller.subscribe();
        controller.load().await.unwrap();

        let proof = ProofUpload::from_file_name("receipt.png", vec![0; 16]);
        assert!(controller.upload_proof(&proof).await.is_err());
        assert_eq!(controller.display_status(), Some(DisplayStatus::UploadFailed));
        assert_eq!(controller.status(), Some(TransactionStatus::WaitingForPayment));
        assert_eq!(controller.error(), Some("File too large"));
        assert!(controller.can_upload());
        assert!(drain(&mut events).contains(&ConfirmationEvent::UploadFailed("File too large".to_string())));

        assert!(controller.upload_proof(&proof).await.is_err());
        assert_eq!(h.backend.calls("upload_payment_proof"), 2);
    }

    #[tokio::test]
    async fn test_failed_upload_clears_once_status_moves_on() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForPayment, 200_000));
        h.backend.push_transaction(tx(TransactionStatus::WaitingForAdminConfirmation, 200_000));
        h.backend.fail_uploads_with(BackendError::Transport("timed out".to_string()));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        controller.set_manual_polling(true);

        let proof = ProofUpload::from_file_name("receipt.png", vec![0; 16]);
        assert!(controller.upload_proof(&proof).await.is_err());
        assert_eq!(controller.display_status(), Some(DisplayStatus::UploadFailed));

        controller.poll_once().await.unwrap();
        assert_eq!(controller.upload_state(), &UploadState::Idle);
        assert_eq!(
            controller.display_status(),
            Some(DisplayStatus::Server(TransactionStatus::WaitingForAdminConfirmation))
        );
    }

    async fn cache(h: &Harness, cached: &Transaction) {
        h.store
            .record_transaction(cached.clone(), PriceBreakdown::compute(100_000, 2, 0, 0, 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminal_cached_transaction_skips_fetch() {
        let h = Harness::new(100_000);
        let cached = tx(TransactionStatus::Rejected, 200_000);
        cache(&h, &cached).await;

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert_eq!(controller.transaction(), Some(&cached));
        assert_eq!(h.backend.calls("get_transaction"), 0);
        assert_eq!(h.backend.calls("get_event"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cached_status_is_refreshed_on_load() {
        let h = Harness::new(100_000);
        cache(&h, &tx(TransactionStatus::WaitingForPayment, 200_000)).await;
        h.backend.push_transaction(tx(TransactionStatus::Expired, 200_000));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert_eq!(controller.status(), Some(TransactionStatus::Expired));
        assert_eq!(h.backend.calls("get_transaction"), 1);
        assert_eq!(
            h.store.transaction(77).await.map(|tx| tx.status),
            Some(TransactionStatus::Expired)
        );

        let (_stop, shutdown) = watch::channel(false);
        assert_eq!(
            controller.run(shutdown).await,
            StopReason::Terminal(TransactionStatus::Expired)
        );
    }

    #[tokio::test]
    async fn test_cached_copy_covers_unreachable_backend() {
        let h = Harness::new(100_000);
        let cached = tx(TransactionStatus::WaitingForPayment, 200_000);
        cache(&h, &cached).await;
        h.backend.push_transaction_error(77, BackendError::Transport("connection refused".to_string()));

        let mut controller = h.controller();
        controller.load().await.unwrap();
        assert_eq!(controller.transaction(), Some(&cached));
        assert!(controller.error().is_none());
        assert_eq!(h.backend.calls("get_transaction"), 1);
    }

    #[tokio::test]
    async fn test_load_failure_halts_controller() {
        let h = Harness::new(100_000);
        let mut controller = h.controller();

        assert!(controller.load().await.is_err());
        assert_eq!(controller.error(), Some("Transaction 77 was not found"));

        let (_stop, shutdown) = watch::channel(false);
        assert!(matches!(controller.run(shutdown).await, StopReason::Failed(_)));
        assert!(matches!(controller.poll_once().await, Err(CheckoutError::NotLoaded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_poll_failures_back_off_then_stop() {
        let h = Harness::new(100_000);
        h.backend.push_transaction(tx(TransactionStatus::WaitingForAdminConfirmation, 200_000));
        h.backend.push_transaction_error(77, BackendError::Transport("connection refused".to_string()));

        let mut controller = h.controller();
        controller.load().await.unwrap();

        let started = Instant::now();
        let (_stop, shutdown) = watch::channel(false);
        let reason = controller.run(shutdown).await;

        assert!(matches!(reason, StopReason::Failed(_)));
        assert_eq!(h.backend.calls("get_transaction"), 6);
        // 20 + 40 + 80 + 160 + 300
        assert_eq!(started.elapsed().as_secs(), 600);
    }
}
