use async_trait::async_trait;
use chrono::Utc;
use gatepass_shared::{
    AuthResponse, CreateTransactionRequest, DiscountQuote, Event, EventQuery, Location, LoginRequest,
    NewReview, Organizer, PriceBreakdown, ProofUpload, RegisterRequest, Review, Section, Ticket,
    Transaction, TransactionStatus, UserProfile,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use crate::backend::{BackendError, BackendResult, StorefrontBackend};

/// Scriptable in-memory backend
///
/// Transaction reads are served from a per-id queue; the last queued
/// response keeps being returned once the queue is down to one entry.
#[derive(Default)]
pub struct MockBackend {
    events: Mutex<HashMap<i64, Event>>,
    transactions: Mutex<HashMap<i64, VecDeque<BackendResult<Transaction>>>>,
    vouchers: Mutex<HashMap<String, i64>>,
    coupons: Mutex<HashMap<String, i64>>,
    users: Mutex<HashMap<String, (String, UserProfile)>>,
    upload_failure: Mutex<Option<BackendError>>,
    create_failure: Mutex<Option<BackendError>>,
    free_ticket_failure: Mutex<Option<BackendError>>,
    tickets: Mutex<Vec<Ticket>>,
    organizers: Mutex<Vec<Organizer>>,
    locations: Mutex<Vec<Location>>,
    sections: Mutex<Vec<Section>>,
    created: Mutex<Vec<(CreateTransactionRequest, Uuid)>>,
    reviews: Mutex<Vec<NewReview>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(self, event: Event) -> Self {
        lock(&self.events).insert(event.id, event);
        self
    }

    pub fn with_voucher(self, code: &str, discount: i64) -> Self {
        lock(&self.vouchers).insert(code.to_string(), discount);
        self
    }

    pub fn with_coupon(self, code: &str, discount: i64) -> Self {
        lock(&self.coupons).insert(code.to_string(), discount);
        self
    }

    pub fn with_user(self, password: &str, profile: UserProfile) -> Self {
        lock(&self.users).insert(profile.email.clone(), (password.to_string(), profile));
        self
    }

    pub fn with_reference_data(self, organizers: Vec<Organizer>, locations: Vec<Location>, sections: Vec<Section>) -> Self {
        *lock(&self.organizers) = organizers;
        *lock(&self.locations) = locations;
        *lock(&self.sections) = sections;
        self
    }

    /// Queue the next response for `GET /transactions/:id`
    pub fn push_transaction(&self, tx: Transaction) {
        lock(&self.transactions)
            .entry(tx.id)
            .or_default()
            .push_back(Ok(tx));
    }

    pub fn push_transaction_error(&self, transaction_id: i64, err: BackendError) {
        lock(&self.transactions)
            .entry(transaction_id)
            .or_default()
            .push_back(Err(err));
    }

    pub fn fail_uploads_with(&self, err: BackendError) {
        *lock(&self.upload_failure) = Some(err);
    }

    /// Fail the next transaction creation only
    pub fn fail_next_create_with(&self, err: BackendError) {
        *lock(&self.create_failure) = Some(err);
    }

    pub fn fail_free_tickets_with(&self, err: BackendError) {
        *lock(&self.free_ticket_failure) = Some(err);
    }

    pub fn calls(&self, operation: &str) -> usize {
        lock(&self.calls).get(operation).copied().unwrap_or(0)
    }

    pub fn created_requests(&self) -> Vec<(CreateTransactionRequest, Uuid)> {
        lock(&self.created).clone()
    }

    pub fn submitted_reviews(&self) -> Vec<NewReview> {
        lock(&self.reviews).clone()
    }

    fn record(&self, operation: &'static str) {
        *lock(&self.calls).entry(operation).or_insert(0) += 1;
    }

    fn current_transaction(&self, transaction_id: i64) -> BackendResult<Transaction> {
        let mut transactions = lock(&self.transactions);
        let queue = transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| BackendError::NotFound(format!("Transaction {}", transaction_id)))?;

        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Err(BackendError::Decode("empty queue".into())))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(BackendError::NotFound(format!("Transaction {}", transaction_id))))
        }
    }

    fn replace_transaction(&self, tx: Transaction) {
        let mut transactions = lock(&self.transactions);
        let queue = transactions.entry(tx.id).or_default();
        queue.clear();
        queue.push_back(Ok(tx));
    }

    fn filtered_events(&self, query: &EventQuery, past: bool) -> Vec<Event> {
        let now = Utc::now();
        let mut events: Vec<Event> = lock(&self.events)
            .values()
            .filter(|e| e.has_ended(now) == past)
            .filter(|e| {
                query
                    .keyword
                    .as_ref()
                    .map(|k| e.name.to_lowercase().contains(&k.to_lowercase()))
                    .unwrap_or(true)
            })
            .filter(|e| query.category.is_none() || e.category == query.category)
            .filter(|e| query.location_id.is_none() || e.location_id == query.location_id)
            .filter(|e| query.organizer_id.is_none() || e.organizer_id == query.organizer_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.id);
        events
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl StorefrontBackend for MockBackend {
    async fn get_event(&self, event_id: i64) -> BackendResult<Event> {
        self.record("get_event");
        lock(&self.events)
            .get(&event_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Event {}", event_id)))
    }

    async fn search_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>> {
        self.record("search_events");
        Ok(self.filtered_events(query, false))
    }

    async fn filter_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>> {
        self.record("filter_events");
        Ok(self.filtered_events(query, false))
    }

    async fn past_events(&self, query: &EventQuery) -> BackendResult<Vec<Event>> {
        self.record("past_events");
        Ok(self.filtered_events(query, true))
    }

    async fn login(&self, req: &LoginRequest) -> BackendResult<AuthResponse> {
        self.record("login");
        let users = lock(&self.users);
        match users.get(&req.email) {
            Some((password, profile)) if *password == req.password => Ok(AuthResponse {
                token: format!("mock-token-{}", profile.id),
                user: profile.clone(),
            }),
            _ => Err(BackendError::Rejected {
                status: 401,
                message: "Invalid email or password".to_string(),
            }),
        }
    }

    async fn register(&self, req: &RegisterRequest) -> BackendResult<UserProfile> {
        self.record("register");
        let mut users = lock(&self.users);
        if users.contains_key(&req.email) {
            return Err(BackendError::Rejected {
                status: 409,
                message: "Email already registered".to_string(),
            });
        }
        let profile = UserProfile {
            id: users.len() as i64 + 1,
            name: req.name.clone(),
            email: req.email.clone(),
            role: Some("customer".to_string()),
            points: 0,
            referral_code: None,
        };
        users.insert(req.email.clone(), (req.password.clone(), profile.clone()));
        Ok(profile)
    }

    async fn get_transaction(&self, transaction_id: i64) -> BackendResult<Transaction> {
        self.record("get_transaction");
        self.current_transaction(transaction_id)
    }

    async fn create_transaction(
        &self,
        req: &CreateTransactionRequest,
        idempotency_key: Uuid,
    ) -> BackendResult<Transaction> {
        self.record("create_transaction");
        if let Some(err) = lock(&self.create_failure).take() {
            return Err(err);
        }
        let event = lock(&self.events)
            .get(&req.event_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Event {}", req.event_id)))?;

        if (req.quantity as i64) > event.remaining_seats {
            return Err(BackendError::Rejected {
                status: 400,
                message: "Not enough seats available".to_string(),
            });
        }

        let voucher_discount = req
            .voucher_code
            .as_ref()
            .and_then(|c| lock(&self.vouchers).get(c).copied())
            .unwrap_or(0);
        let coupon_discount = req
            .coupon_code
            .as_ref()
            .and_then(|c| lock(&self.coupons).get(c).copied())
            .unwrap_or(0);
        let breakdown = PriceBreakdown::compute(
            event.price,
            req.quantity,
            voucher_discount,
            coupon_discount,
            req.points_used,
        );

        let mut created = lock(&self.created);
        created.push((req.clone(), idempotency_key));
        let now = Utc::now();
        let tx = Transaction {
            id: 1000 + created.len() as i64,
            event_id: req.event_id,
            user_id: 1,
            quantity: req.quantity,
            attend_date: req.attend_date,
            payment_method: req.payment_method,
            voucher_code: req.voucher_code.clone(),
            voucher_discount,
            coupon_code: req.coupon_code.clone(),
            coupon_discount,
            points_used: req.points_used,
            total_pay_amount: breakdown.total,
            status: if breakdown.total == 0 {
                TransactionStatus::Confirmed
            } else {
                TransactionStatus::WaitingForPayment
            },
            payment_proof_url: None,
            tickets: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        drop(created);

        self.replace_transaction(tx.clone());
        Ok(tx)
    }

    async fn upload_payment_proof(
        &self,
        transaction_id: i64,
        proof: &ProofUpload,
    ) -> BackendResult<Transaction> {
        self.record("upload_payment_proof");
        if let Some(err) = lock(&self.upload_failure).clone() {
            return Err(err);
        }

        let mut tx = self.current_transaction(transaction_id)?;
        if tx.status != TransactionStatus::WaitingForPayment {
            return Err(BackendError::Rejected {
                status: 400,
                message: "Transaction is not waiting for payment".to_string(),
            });
        }
        tx.status = TransactionStatus::WaitingForAdminConfirmation;
        tx.payment_proof_url = Some(format!("https://files.example.com/{}", proof.file_name));
        tx.updated_at = Utc::now();
        self.replace_transaction(tx.clone());
        Ok(tx)
    }

    async fn generate_free_tickets(&self, transaction_id: i64) -> BackendResult<Vec<Ticket>> {
        self.record("generate_free_tickets");
        if let Some(err) = lock(&self.free_ticket_failure).clone() {
            return Err(err);
        }
        let mut tx = self.current_transaction(transaction_id)?;
        let now = Utc::now();
        let issued: Vec<Ticket> = (0..tx.quantity)
            .map(|n| Ticket {
                id: transaction_id * 10 + n as i64,
                transaction_id,
                event_id: tx.event_id,
                code: format!("FREE-{}-{}", transaction_id, n + 1),
                attend_date: Some(tx.attend_date),
                event_name: None,
                created_at: now,
            })
            .collect();

        tx.tickets = issued.clone();
        self.replace_transaction(tx);
        lock(&self.tickets).extend(issued.iter().cloned());
        Ok(issued)
    }

    async fn list_tickets(&self) -> BackendResult<Vec<Ticket>> {
        self.record("list_tickets");
        Ok(lock(&self.tickets).clone())
    }

    async fn check_voucher(&self, code: &str, _event_id: i64) -> BackendResult<DiscountQuote> {
        self.record("check_voucher");
        lock(&self.vouchers)
            .get(code)
            .map(|discount| DiscountQuote {
                code: code.to_string(),
                discount: *discount,
            })
            .ok_or_else(|| BackendError::Rejected {
                status: 400,
                message: "Invalid voucher code".to_string(),
            })
    }

    async fn check_coupon(&self, code: &str) -> BackendResult<DiscountQuote> {
        self.record("check_coupon");
        lock(&self.coupons)
            .get(code)
            .map(|discount| DiscountQuote {
                code: code.to_string(),
                discount: *discount,
            })
            .ok_or_else(|| BackendError::Rejected {
                status: 400,
                message: "Invalid coupon code".to_string(),
            })
    }

    async fn get_organizer(&self, organizer_id: i64) -> BackendResult<Organizer> {
        self.record("get_organizer");
        lock(&self.organizers)
            .iter()
            .find(|o| o.id == organizer_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Organizer {}", organizer_id)))
    }

    async fn list_locations(&self) -> BackendResult<Vec<Location>> {
        self.record("list_locations");
        Ok(lock(&self.locations).clone())
    }

    async fn list_sections(&self) -> BackendResult<Vec<Section>> {
        self.record("list_sections");
        Ok(lock(&self.sections).clone())
    }

    async fn create_review(&self, review: &NewReview) -> BackendResult<Review> {
        self.record("create_review");
        let mut reviews = lock(&self.reviews);
        reviews.push(review.clone());
        Ok(Review {
            id: reviews.len() as i64,
            event_id: review.event_id,
            user_id: 1,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        })
    }
}
