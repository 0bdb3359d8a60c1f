pub mod confirmation;
pub mod countdown;
pub mod discount;
pub mod form;
pub mod lifecycle;
pub mod polling;

pub use confirmation::{ConfirmationEvent, DisplayStatus, PaymentConfirmation, PollOutcome, StopReason, UploadState};
pub use countdown::{Countdown, CountdownStyle};
pub use discount::{DiscountKind, DiscountState};
pub use form::{Field, FieldError, TransactionForm};
pub use lifecycle::{Observation, StatusTracker};
pub use polling::PollPolicy;

use gatepass_core::{BackendError, CoreError};
use gatepass_shared::TransactionStatus;

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("{}", join_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    DiscountNotApplied(String),

    #[error("Invalid discount action: {0}")]
    DiscountState(String),

    #[error("Transaction {0} was already submitted from this form")]
    AlreadySubmitted(i64),

    #[error("Payment proof cannot be uploaded while the transaction is {0}")]
    UploadNotAllowed(TransactionStatus),

    #[error("Transaction has not been loaded")]
    NotLoaded,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] CoreError),
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;
