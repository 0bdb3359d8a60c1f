use gatepass_catalog::CatalogError;
use gatepass_checkout::CheckoutError;
use gatepass_core::{BackendError, CoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    fn backend(&self) -> Option<&BackendError> {
        match self {
            AppError::Backend(e)
            | AppError::Checkout(CheckoutError::Backend(e))
            | AppError::Catalog(CatalogError::Backend(e)) => Some(e),
            _ => None,
        }
    }

    /// 2 usage or validation, 3 unauthorized, 4 backend rejection, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if let Some(backend) = self.backend() {
            return match backend {
                BackendError::Unauthorized(_) => 3,
                BackendError::Rejected { .. } | BackendError::NotFound(_) => 4,
                BackendError::Transport(_) | BackendError::Decode(_) => 1,
            };
        }

        match self {
            AppError::Usage(_)
            | AppError::Catalog(CatalogError::InvalidQuery(_))
            | AppError::Checkout(
                CheckoutError::Validation(_)
                | CheckoutError::DiscountNotApplied(_)
                | CheckoutError::DiscountState(_)
                | CheckoutError::AlreadySubmitted(_)
                | CheckoutError::UploadNotAllowed(_),
            ) => 2,
            _ => 1,
        }
    }

    pub fn user_message(&self) -> String {
        if let Some(backend) = self.backend() {
            return backend.user_message();
        }
        match self {
            AppError::Anyhow(err) => {
                tracing::error!("Command failed: {:#}", err);
                format!("{:#}", err)
            }
            AppError::Storage(err) => {
                tracing::error!("Local storage failure: {}", err);
                err.to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_checkout::{Field, FieldError};
    use gatepass_shared::TransactionStatus;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::Usage("bad flag".into()).exit_code(), 2);
        assert_eq!(
            AppError::from(CheckoutError::Validation(vec![FieldError {
                field: Field::Quantity,
                message: "Select at least one ticket".into(),
            }]))
            .exit_code(),
            2
        );
        assert_eq!(
            AppError::from(CheckoutError::UploadNotAllowed(TransactionStatus::Confirmed)).exit_code(),
            2
        );
        assert_eq!(AppError::from(BackendError::Unauthorized("expired".into())).exit_code(), 3);
        assert_eq!(
            AppError::from(CheckoutError::Backend(BackendError::Rejected {
                status: 400,
                message: "Not enough seats available".into(),
            }))
            .exit_code(),
            4
        );
        assert_eq!(AppError::from(BackendError::Transport("refused".into())).exit_code(), 1);
        assert_eq!(AppError::from(anyhow::anyhow!("boom")).exit_code(), 1);
    }

    #[test]
    fn test_nested_backend_message_is_surfaced() {
        let err = AppError::from(CatalogError::Backend(BackendError::NotFound("Event 9".into())));
        assert_eq!(err.user_message(), "Event 9 was not found");
    }
}
