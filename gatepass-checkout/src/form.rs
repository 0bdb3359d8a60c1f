use chrono::NaiveDate;
use gatepass_core::{BackendError, Clock, StorefrontBackend};
use gatepass_shared::{
    CreateTransactionRequest, DiscountQuote, Event, PaymentMethod, PriceBreakdown, Transaction,
};
use gatepass_store::app_config::CheckoutRules;
use gatepass_store::CheckoutStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::discount::{DiscountKind, DiscountState};
use crate::{CheckoutError, CheckoutResult};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Event,
    Quantity,
    AttendDate,
    Discount,
    Points,
    PaymentMethod,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Purchase form for one event
///
/// Validation runs against the event as it was fetched; the backend
/// re-checks seats and discounts when the transaction is created.
pub struct TransactionForm {
    event: Event,
    rules: CheckoutRules,
    available_points: i64,
    clock: Arc<dyn Clock>,
    quantity: u32,
    attend_date: Option<NaiveDate>,
    discount: DiscountState,
    points: i64,
    payment_method: Option<PaymentMethod>,
    idempotency_key: Uuid,
    last_request: Option<CreateTransactionRequest>,
    submitted: Option<i64>,
}

impl TransactionForm {
    pub fn new(event: Event, rules: CheckoutRules, available_points: i64, clock: Arc<dyn Clock>) -> Self {
        // Single-day events have only one valid date
        let (first, last) = event.attend_window();
        let attend_date = (first == last).then_some(first);

        Self {
            event,
            rules,
            available_points: available_points.max(0),
            clock,
            quantity: 1,
            attend_date,
            discount: DiscountState::default(),
            points: 0,
            payment_method: None,
            idempotency_key: Uuid::new_v4(),
            last_request: None,
            submitted: None,
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn discount(&self) -> &DiscountState {
        &self.discount
    }

    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    pub fn set_attend_date(&mut self, date: NaiveDate) {
        self.attend_date = Some(date);
    }

    pub fn enter_voucher(&mut self, code: &str) {
        self.discount.enter(DiscountKind::Voucher, code);
    }

    pub fn enter_coupon(&mut self, code: &str) {
        self.discount.enter(DiscountKind::Coupon, code);
    }

    pub fn clear_discount(&mut self) {
        self.discount.clear();
    }

    pub fn set_points(&mut self, points: i64) {
        self.points = points;
    }

    pub fn set_payment_method(&mut self, method: Option<PaymentMethod>) {
        self.payment_method = method;
    }

    /// Largest quantity the form will accept right now
    pub fn max_quantity(&self) -> u32 {
        let seats = u32::try_from(self.event.remaining_seats.max(0)).unwrap_or(u32::MAX);
        self.rules.max_tickets_per_transaction.min(seats)
    }

    pub fn breakdown(&self) -> PriceBreakdown {
        PriceBreakdown::compute(
            self.event.price,
            self.quantity,
            self.discount.discount_for(DiscountKind::Voucher),
            self.discount.discount_for(DiscountKind::Coupon),
            self.points.max(0),
        )
    }

    /// Per-field problems with the current input, empty when valid
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let now = self.clock.now();

        if self.event.has_ended(now) {
            errors.push(FieldError::new(Field::Event, "This event has already ended"));
        } else if self.event.is_sold_out() {
            errors.push(FieldError::new(Field::Event, "This event is sold out"));
        }

        if self.quantity == 0 {
            errors.push(FieldError::new(Field::Quantity, "Select at least one ticket"));
        } else if self.quantity > self.rules.max_tickets_per_transaction {
            errors.push(FieldError::new(
                Field::Quantity,
                format!(
                    "You can buy at most {} tickets per transaction",
                    self.rules.max_tickets_per_transaction
                ),
            ));
        } else if i64::from(self.quantity) > self.event.remaining_seats {
            errors.push(FieldError::new(
                Field::Quantity,
                format!("Only {} seats left", self.event.remaining_seats.max(0)),
            ));
        }

        match self.attend_date {
            None => errors.push(FieldError::new(Field::AttendDate, "Choose an attendance date")),
            Some(date) if !self.event.accepts_attend_date(date) => {
                let (first, last) = self.event.attend_window();
                errors.push(FieldError::new(
                    Field::AttendDate,
                    format!("Attendance date must be between {} and {}", first, last),
                ));
            }
            Some(_) => {}
        }

        if let Some(block) = self.discount.submission_block() {
            errors.push(FieldError::new(Field::Discount, block));
        }

        let breakdown = self.breakdown();
        let redeemable = breakdown.subtotal - breakdown.voucher_discount - breakdown.coupon_discount;
        if self.points < 0 {
            errors.push(FieldError::new(Field::Points, "Points cannot be negative"));
        } else if self.points > self.available_points {
            errors.push(FieldError::new(
                Field::Points,
                format!("You only have {} points", self.available_points),
            ));
        } else if self.points > 0 && self.points > redeemable.max(0) {
            errors.push(FieldError::new(
                Field::Points,
                format!("At most {} points can be used on this purchase", redeemable.max(0)),
            ));
        }

        if self.payment_method.is_none() && breakdown.total > 0 {
            errors.push(FieldError::new(Field::PaymentMethod, "Choose a payment method"));
        }

        errors
    }

    /// First reason the purchase button is disabled
    pub fn submit_block(&self) -> Option<String> {
        if let Some(id) = self.submitted {
            return Some(format!("Transaction {} has already been created", id));
        }
        if let Some(block) = self.discount.submission_block() {
            return Some(block);
        }
        self.validate().into_iter().next().map(|e| e.message)
    }

    pub fn can_submit(&self) -> bool {
        self.submit_block().is_none()
    }

    /// Check the entered voucher or coupon with the backend
    pub async fn apply_discount(&mut self, backend: &dyn StorefrontBackend) -> CheckoutResult<DiscountQuote> {
        let (kind, code) = self.discount.start_validation()?;
        info!("Checking {} {} for event {}", kind.label(), code, self.event.id);

        let result = match kind {
            DiscountKind::Voucher => backend.check_voucher(&code, self.event.id).await,
            DiscountKind::Coupon => backend.check_coupon(&code).await,
        };
        let failure = result.as_ref().err().cloned();
        self.discount.finish_validation(&code, result);

        if let Some(err) = failure {
            return Err(CheckoutError::Backend(err));
        }
        self.discount
            .applied(kind)
            .cloned()
            .ok_or_else(|| CheckoutError::DiscountState(format!("the {} code changed", kind.label())))
    }

    /// Create the transaction and record it in the checkout store.
    /// The idempotency key is reused only when the same request is resent
    /// after a transport failure.
    pub async fn submit(
        &mut self,
        backend: &dyn StorefrontBackend,
        store: &CheckoutStore,
    ) -> CheckoutResult<Transaction> {
        if let Some(id) = self.submitted {
            return Err(CheckoutError::AlreadySubmitted(id));
        }
        if let Some(block) = self.discount.submission_block() {
            return Err(CheckoutError::DiscountNotApplied(block));
        }

        let errors = self.validate();
        let attend_date = match (errors.is_empty(), self.attend_date) {
            (true, Some(date)) => date,
            _ => return Err(CheckoutError::Validation(errors)),
        };

        store.begin(self.event.id).await?;

        let request = CreateTransactionRequest {
            event_id: self.event.id,
            quantity: self.quantity,
            attend_date,
            payment_method: self.payment_method,
            voucher_code: self.discount.applied(DiscountKind::Voucher).map(|q| q.code.clone()),
            coupon_code: self.discount.applied(DiscountKind::Coupon).map(|q| q.code.clone()),
            points_used: self.points,
        };
        info!(
            "Creating transaction for event {} ({} x {}, estimated total {})",
            self.event.id,
            self.quantity,
            self.event.price,
            self.breakdown().total
        );

        if self.last_request.as_ref().is_some_and(|sent| *sent != request) {
            self.idempotency_key = Uuid::new_v4();
        }

        let tx = match backend.create_transaction(&request, self.idempotency_key).await {
            Ok(tx) => tx,
            Err(e) => {
                error!("Transaction creation for event {} failed: {}", self.event.id, e);
                if matches!(e, BackendError::Transport(_)) {
                    self.last_request = Some(request);
                } else {
                    self.idempotency_key = Uuid::new_v4();
                    self.last_request = None;
                }
                return Err(e.into());
            }
        };

        self.submitted = Some(tx.id);
        store
            .record_transaction(tx.clone(), PriceBreakdown::from_transaction(&tx, self.event.price))
            .await?;
        Ok(tx)
    }
}
