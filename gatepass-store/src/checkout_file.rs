use gatepass_core::{CheckoutPersistence, CoreResult};
use gatepass_shared::CheckoutState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::session_file::{read_if_present, remove_if_present, write_atomically};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    state: CheckoutState,
}

/// Checkout state persisted as a versioned JSON snapshot
#[derive(Debug, Clone)]
pub struct FileCheckoutPersistence {
    path: PathBuf,
}

impl FileCheckoutPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CheckoutPersistence for FileCheckoutPersistence {
    fn load(&self) -> CoreResult<Option<CheckoutState>> {
        let Some(raw) = read_if_present(&self.path)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Ok(Some(snapshot.state)),
            Ok(snapshot) => {
                warn!(
                    "Discarding checkout snapshot with version {} (expected {})",
                    snapshot.version, SNAPSHOT_VERSION
                );
                Ok(None)
            }
            Err(e) => {
                warn!("Discarding unreadable checkout snapshot {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    fn save(&self, state: &CheckoutState) -> CoreResult<()> {
        let raw = serde_json::to_string_pretty(&Snapshot {
            version: SNAPSHOT_VERSION,
            state: state.clone(),
        })?;
        write_atomically(&self.path, &raw)
    }

    fn clear(&self) -> CoreResult<()> {
        remove_if_present(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("gatepass-checkout-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_stale_snapshot_version_is_ignored() {
        let path = temp_path();
        std::fs::write(&path, r#"{"version":0,"state":{"event_id":4}}"#).unwrap();

        let persistence = FileCheckoutPersistence::new(&path);
        assert!(persistence.load().unwrap().is_none());
        persistence.clear().unwrap();
    }

    #[test]
    fn test_corrupt_snapshot_is_ignored() {
        let path = temp_path();
        std::fs::write(&path, "{not json").unwrap();

        let persistence = FileCheckoutPersistence::new(&path);
        assert!(persistence.load().unwrap().is_none());
        persistence.clear().unwrap();
    }

    #[test]
    fn test_saved_state_loads_back() {
        let persistence = FileCheckoutPersistence::new(temp_path());
        let state = CheckoutState {
            event_id: Some(12),
            ..Default::default()
        };
        persistence.save(&state).unwrap();
        assert_eq!(persistence.load().unwrap(), Some(state));
        persistence.clear().unwrap();
    }
}
