use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transaction::TransactionStatus;

/// Emitted when a poll observes a status different from the cached one
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusChangedEvent {
    pub transaction_id: i64,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
    pub observed_at: DateTime<Utc>,
}

/// Views a controller can send the user to
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    PaymentSuccess { transaction_id: i64 },
    Tickets,
    EventDetail { event_id: i64 },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::PaymentSuccess { transaction_id } => format!("/payment/{}/success", transaction_id),
            Route::Tickets => "/tickets".to_string(),
            Route::EventDetail { event_id } => format!("/events/{}", event_id),
        }
    }
}
