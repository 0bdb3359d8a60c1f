pub mod checkout;
pub mod event;
pub mod events;
pub mod reference;
pub mod review;
pub mod transaction;
pub mod user;

use serde::{Deserialize, Serialize};

/// Envelope the backend wraps successful responses in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}
