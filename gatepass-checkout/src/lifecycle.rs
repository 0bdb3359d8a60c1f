use chrono::{DateTime, Utc};
use gatepass_shared::TransactionStatus;
use tracing::{info, warn};

/// What a freshly polled status means relative to the last one seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Unchanged,
    Advanced {
        from: TransactionStatus,
        to: TransactionStatus,
    },
    /// The backend moved somewhere the happy path does not go. Still
    /// applied, the server is authoritative.
    Unexpected {
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

impl Observation {
    pub fn is_change(&self) -> bool {
        !matches!(self, Observation::Unchanged)
    }
}

/// Tracks the observed status history of one transaction
pub struct StatusTracker {
    transaction_id: i64,
    current: Option<TransactionStatus>,
    history: Vec<(TransactionStatus, DateTime<Utc>)>,
}

impl StatusTracker {
    pub fn new(transaction_id: i64) -> Self {
        Self {
            transaction_id,
            current: None,
            history: Vec::new(),
        }
    }

    /// Observed statuses, one entry per change
    pub fn history(&self) -> &[(TransactionStatus, DateTime<Utc>)] {
        &self.history
    }

    /// Record `status` as seen at `at`
    pub fn observe(&mut self, status: TransactionStatus, at: DateTime<Utc>) -> Observation {
        let previous = match self.current {
            None => {
                self.record(status, at);
                return Observation::Unchanged;
            }
            Some(previous) if previous == status => return Observation::Unchanged,
            Some(previous) => previous,
        };

        self.record(status, at);
        if is_expected_transition(previous, status) {
            info!(
                "Transaction {} moved from {} to {}",
                self.transaction_id, previous, status
            );
            Observation::Advanced { from: previous, to: status }
        } else {
            warn!(
                "Transaction {} moved unexpectedly from {} to {}",
                self.transaction_id, previous, status
            );
            Observation::Unexpected { from: previous, to: status }
        }
    }

    fn record(&mut self, status: TransactionStatus, at: DateTime<Utc>) {
        self.current = Some(status);
        self.history.push((status, at));
    }
}

/// Forward along the happy path, or from a pending state into a failure
fn is_expected_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    match (from.progress_rank(), to.progress_rank()) {
        (Some(a), Some(b)) => b > a,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_shared::TransactionStatus::*;

    #[test]
    fn test_happy_path_advances() {
        let mut tracker = StatusTracker::new(9);
        let now = Utc::now();

        assert_eq!(tracker.observe(WaitingForPayment, now), Observation::Unchanged);
        assert_eq!(tracker.observe(WaitingForPayment, now), Observation::Unchanged);
        assert_eq!(
            tracker.observe(WaitingForAdminConfirmation, now),
            Observation::Advanced { from: WaitingForPayment, to: WaitingForAdminConfirmation }
        );
        assert_eq!(
            tracker.observe(Confirmed, now),
            Observation::Advanced { from: WaitingForAdminConfirmation, to: Confirmed }
        );
        assert_eq!(tracker.history().len(), 3);
    }

    #[test]
    fn test_rejection_while_pending_is_expected() {
        let mut tracker = StatusTracker::new(9);
        tracker.observe(WaitingForAdminConfirmation, Utc::now());
        assert!(matches!(
            tracker.observe(Rejected, Utc::now()),
            Observation::Advanced { to: Rejected, .. }
        ));
    }

    #[test]
    fn test_regressions_are_flagged_but_applied() {
        let mut tracker = StatusTracker::new(9);
        tracker.observe(WaitingForAdminConfirmation, Utc::now());
        assert!(matches!(
            tracker.observe(WaitingForPayment, Utc::now()),
            Observation::Unexpected { .. }
        ));
        assert_eq!(tracker.current, Some(WaitingForPayment));

        tracker.observe(Confirmed, Utc::now());
        assert!(matches!(
            tracker.observe(Canceled, Utc::now()),
            Observation::Unexpected { from: Confirmed, to: Canceled }
        ));
    }
}
