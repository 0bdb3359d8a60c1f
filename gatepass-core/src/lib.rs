pub mod backend;
pub mod clock;
pub mod mock;
pub mod persistence;
pub mod session;

pub use backend::{BackendError, BackendResult, StorefrontBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use mock::MockBackend;
pub use persistence::{CheckoutPersistence, MemoryCheckoutPersistence};
pub use session::{MemorySessionStore, SessionStore, TokenClaims};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
