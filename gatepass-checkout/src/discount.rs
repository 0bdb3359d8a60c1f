use gatepass_core::BackendResult;
use gatepass_shared::DiscountQuote;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{CheckoutError, CheckoutResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Voucher,
    Coupon,
}

impl DiscountKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiscountKind::Voucher => "voucher",
            DiscountKind::Coupon => "coupon",
        }
    }
}

/// Two-phase discount entry: a typed code only counts once applied.
///
/// The state carries a single kind, so a voucher and a coupon can never be
/// held at the same time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DiscountState {
    #[default]
    Empty,
    Entered {
        kind: DiscountKind,
        code: String,
    },
    Validating {
        kind: DiscountKind,
        code: String,
    },
    Applied {
        kind: DiscountKind,
        quote: DiscountQuote,
    },
    Invalid {
        kind: DiscountKind,
        code: String,
        reason: String,
    },
}

impl DiscountState {
    /// Record a typed code. Retyping the applied code keeps it applied.
    pub fn enter(&mut self, kind: DiscountKind, code: &str) {
        let code = code.trim();
        if code.is_empty() {
            *self = DiscountState::Empty;
            return;
        }

        if let DiscountState::Applied { kind: applied_kind, quote } = self {
            if *applied_kind == kind && quote.code == code {
                return;
            }
        }

        *self = DiscountState::Entered {
            kind,
            code: code.to_string(),
        };
    }

    pub fn clear(&mut self) {
        *self = DiscountState::Empty;
    }

    /// Move to `Validating`, returning what should be checked
    pub fn start_validation(&mut self) -> CheckoutResult<(DiscountKind, String)> {
        let (kind, code) = match self {
            DiscountState::Entered { kind, code } | DiscountState::Invalid { kind, code, .. } => {
                (*kind, code.clone())
            }
            DiscountState::Empty => {
                return Err(CheckoutError::DiscountState("no code has been entered".to_string()))
            }
            DiscountState::Validating { kind, .. } => {
                return Err(CheckoutError::DiscountState(format!(
                    "the {} code is already being checked",
                    kind.label()
                )))
            }
            DiscountState::Applied { kind, .. } => {
                return Err(CheckoutError::DiscountState(format!(
                    "the {} code is already applied",
                    kind.label()
                )))
            }
        };

        *self = DiscountState::Validating {
            kind,
            code: code.clone(),
        };
        Ok((kind, code))
    }

    /// Settle a check for `code`. A stale result (the code changed while it
    /// was being checked) is dropped and `false` returned.
    pub fn finish_validation(&mut self, code: &str, result: BackendResult<DiscountQuote>) -> bool {
        let kind = match self {
            DiscountState::Validating { kind, code: pending } if pending.as_str() == code => *kind,
            _ => return false,
        };

        *self = match result {
            Ok(quote) => {
                info!("Applied {} {} worth {}", kind.label(), code, quote.discount);
                DiscountState::Applied {
                    kind,
                    quote: DiscountQuote {
                        code: code.to_string(),
                        discount: quote.discount.max(0),
                    },
                }
            }
            Err(e) => {
                warn!("{} {} rejected: {}", kind.label(), code, e);
                DiscountState::Invalid {
                    kind,
                    code: code.to_string(),
                    reason: e.user_message(),
                }
            }
        };
        true
    }

    /// Why the purchase button must stay disabled, if it must
    pub fn submission_block(&self) -> Option<String> {
        match self {
            DiscountState::Empty | DiscountState::Applied { .. } => None,
            DiscountState::Entered { kind, .. } | DiscountState::Validating { kind, .. } => {
                Some(format!("Please apply the {} code first", kind.label()))
            }
            DiscountState::Invalid { kind, reason, .. } => Some(format!(
                "The {} code is invalid ({}). Fix it or clear it to continue",
                kind.label(),
                reason
            )),
        }
    }

    pub fn applied(&self, kind: DiscountKind) -> Option<&DiscountQuote> {
        match self {
            DiscountState::Applied { kind: k, quote } if *k == kind => Some(quote),
            _ => None,
        }
    }

    pub fn discount_for(&self, kind: DiscountKind) -> i64 {
        self.applied(kind).map(|q| q.discount).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_core::BackendError;

    fn quote(code: &str, discount: i64) -> DiscountQuote {
        DiscountQuote { code: code.to_string(), discount }
    }

    #[test]
    fn test_entered_code_blocks_until_applied() {
        let mut state = DiscountState::default();
        assert!(state.submission_block().is_none());

        state.enter(DiscountKind::Voucher, " HEMAT10 ");
        assert_eq!(
            state.submission_block().as_deref(),
            Some("Please apply the voucher code first")
        );
        assert_eq!(state.discount_for(DiscountKind::Voucher), 0);

        let (kind, code) = state.start_validation().unwrap();
        assert_eq!((kind, code.as_str()), (DiscountKind::Voucher, "HEMAT10"));
        assert!(state.submission_block().is_some());

        assert!(state.finish_validation("HEMAT10", Ok(quote("HEMAT10", 10_000))));
        assert!(state.submission_block().is_none());
        assert_eq!(state.discount_for(DiscountKind::Voucher), 10_000);
        assert_eq!(state.discount_for(DiscountKind::Coupon), 0);
    }

    #[test]
    fn test_rejected_code_stays_blocking() {
        let mut state = DiscountState::default();
        state.enter(DiscountKind::Coupon, "NOPE");
        state.start_validation().unwrap();
        state.finish_validation(
            "NOPE",
            Err(BackendError::Rejected { status: 400, message: "Invalid coupon code".to_string() }),
        );

        let block = state.submission_block().unwrap();
        assert!(block.contains("Invalid coupon code"));

        // Invalid codes can be checked again
        assert!(state.start_validation().is_ok());
    }

    #[test]
    fn test_editing_applied_code_unapplies_it() {
        let mut state = DiscountState::default();
        state.enter(DiscountKind::Voucher, "HEMAT10");
        state.start_validation().unwrap();
        state.finish_validation("HEMAT10", Ok(quote("HEMAT10", 10_000)));

        state.enter(DiscountKind::Voucher, "HEMAT10");
        assert_eq!(state.discount_for(DiscountKind::Voucher), 10_000);

        state.enter(DiscountKind::Voucher, "HEMAT20");
        assert_eq!(state.discount_for(DiscountKind::Voucher), 0);
        assert!(state.submission_block().is_some());
    }

    #[test]
    fn test_switching_kind_drops_the_other_discount() {
        let mut state = DiscountState::default();
        state.enter(DiscountKind::Voucher, "HEMAT10");
        state.start_validation().unwrap();
        state.finish_validation("HEMAT10", Ok(quote("HEMAT10", 10_000)));

        state.enter(DiscountKind::Coupon, "WELCOME");
        assert_eq!(state.discount_for(DiscountKind::Voucher), 0);
        assert!(matches!(state, DiscountState::Entered { kind: DiscountKind::Coupon, .. }));
    }

    #[test]
    fn test_stale_validation_result_is_dropped() {
        let mut state = DiscountState::default();
        state.enter(DiscountKind::Voucher, "OLD");
        state.start_validation().unwrap();
        state.enter(DiscountKind::Voucher, "NEW");

        assert!(!state.finish_validation("OLD", Ok(quote("OLD", 5_000))));
        assert!(matches!(state, DiscountState::Entered { ref code, .. } if code == "NEW"));
    }

    #[test]
    fn test_invalid_actions_are_rejected() {
        let mut state = DiscountState::default();
        assert!(state.start_validation().is_err());

        state.enter(DiscountKind::Voucher, "HEMAT10");
        state.start_validation().unwrap();
        assert!(state.start_validation().is_err());

        state.enter(DiscountKind::Voucher, "");
        assert_eq!(state, DiscountState::Empty);
    }
}
