use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transaction::{Transaction, TransactionStatus};

/// Client-side estimate of what a purchase will cost
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub unit_price: i64,
    pub quantity: u32,
    pub subtotal: i64,
    pub voucher_discount: i64,
    pub coupon_discount: i64,
    pub points_used: i64,
    pub total: i64,
}

impl PriceBreakdown {
    /// `max(0, unit_price * quantity - voucher - coupon - points)`
    pub fn compute(
        unit_price: i64,
        quantity: u32,
        voucher_discount: i64,
        coupon_discount: i64,
        points_used: i64,
    ) -> Self {
        let subtotal = unit_price.saturating_mul(quantity as i64);
        let total = subtotal
            .saturating_sub(voucher_discount)
            .saturating_sub(coupon_discount)
            .saturating_sub(points_used)
            .max(0);

        Self {
            unit_price,
            quantity,
            subtotal,
            voucher_discount,
            coupon_discount,
            points_used,
            total,
        }
    }

    /// Rebuild the estimate from a transaction the backend returned
    pub fn from_transaction(tx: &Transaction, unit_price: i64) -> Self {
        let mut breakdown = Self::compute(
            unit_price,
            tx.quantity,
            tx.voucher_discount,
            tx.coupon_discount,
            tx.points_used,
        );
        breakdown.total = tx.total_pay_amount;
        breakdown
    }
}

/// Cross-step checkout state, persisted between runs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CheckoutState {
    #[serde(default)]
    pub event_id: Option<i64>,
    #[serde(default)]
    pub transaction: Option<Transaction>,
    #[serde(default)]
    pub breakdown: Option<PriceBreakdown>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CheckoutState {
    pub fn is_empty(&self) -> bool {
        self.event_id.is_none() && self.transaction.is_none() && self.breakdown.is_none()
    }

    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        self.transaction.as_ref().map(|tx| tx.status)
    }

    /// A transaction for `event_id` must start from scratch
    pub fn is_unrelated_to(&self, event_id: i64) -> bool {
        if self.event_id != Some(event_id) {
            return true;
        }
        self.transaction_status().map(|s| s.is_terminal()).unwrap_or(false)
    }
}
