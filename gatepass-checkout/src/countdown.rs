use chrono::{DateTime, Duration, Utc};
use gatepass_shared::{Transaction, TransactionStatus};
use gatepass_store::app_config::CheckoutRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStyle {
    /// `HH:MM:SS`
    Clock,
    /// `Dd Hh Mm Ss`
    Days,
}

/// Time left before a deadline. Display only, the backend enforces expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub deadline: DateTime<Utc>,
    pub style: CountdownStyle,
}

impl Countdown {
    /// The countdown that applies to `tx` in its current status, if any
    pub fn for_transaction(tx: &Transaction, rules: &CheckoutRules) -> Option<Self> {
        match tx.status {
            TransactionStatus::WaitingForPayment => Some(Self {
                deadline: tx.created_at + rules.payment_window(),
                style: CountdownStyle::Clock,
            }),
            TransactionStatus::WaitingForAdminConfirmation => Some(Self {
                deadline: tx.updated_at + rules.admin_window(),
                style: CountdownStyle::Days,
            }),
            _ => None,
        }
    }

    /// `None` once the deadline has been reached
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let remaining = self.deadline - now;
        if remaining <= Duration::zero() {
            None
        } else {
            Some(remaining)
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now).is_none()
    }

    pub fn render(&self, now: DateTime<Utc>) -> String {
        match self.remaining(now) {
            None => "Expired".to_string(),
            Some(remaining) => {
                let secs = remaining.num_seconds();
                match self.style {
                    CountdownStyle::Clock => format_clock(secs),
                    CountdownStyle::Days => format_days(secs),
                }
            }
        }
    }
}

fn format_clock(total_secs: i64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

fn format_days(total_secs: i64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
}
