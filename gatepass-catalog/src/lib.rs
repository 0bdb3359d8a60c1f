pub mod browse;
pub mod detail;
pub mod query;

pub use browse::EventCatalog;
pub use detail::EventDetail;
pub use query::validate_query;

use gatepass_core::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
