use gatepass_shared::CheckoutState;
use std::sync::Mutex;

use crate::{CoreError, CoreResult};

/// Serialize/deserialize boundary for the checkout state
pub trait CheckoutPersistence: Send + Sync {
    fn load(&self) -> CoreResult<Option<CheckoutState>>;

    fn save(&self, state: &CheckoutState) -> CoreResult<()>;

    fn clear(&self) -> CoreResult<()>;
}

/// Keeps the serialized form in memory, so tests exercise the same encoding
#[derive(Debug, Default)]
pub struct MemoryCheckoutPersistence {
    snapshot: Mutex<Option<String>>,
}

impl MemoryCheckoutPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> Option<String> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

impl CheckoutPersistence for MemoryCheckoutPersistence {
    fn load(&self) -> CoreResult<Option<CheckoutState>> {
        let guard = self.snapshot.lock().map_err(|e| CoreError::Storage(e.to_string()))?;
        match guard.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &CheckoutState) -> CoreResult<()> {
        let raw = serde_json::to_string(state)?;
        let mut guard = self.snapshot.lock().map_err(|e| CoreError::Storage(e.to_string()))?;
        *guard = Some(raw);
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        let mut guard = self.snapshot.lock().map_err(|e| CoreError::Storage(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}
