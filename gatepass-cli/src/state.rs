use gatepass_catalog::EventCatalog;
use gatepass_checkout::{PaymentConfirmation, PollPolicy};
use gatepass_core::{Clock, SessionStore, StorefrontBackend, SystemClock};
use gatepass_store::app_config::{CheckoutRules, Config, PollingConfig};
use gatepass_store::{CheckoutStore, FileCheckoutPersistence, FileSessionStore, HttpBackend};
use std::sync::Arc;

use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StorefrontBackend>,
    pub sessions: Arc<dyn SessionStore>,
    pub store: Arc<CheckoutStore>,
    pub clock: Arc<dyn Clock>,
    pub rules: CheckoutRules,
    pub polling: PollingConfig,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let sessions: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::new(config.storage.session_path.clone()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let backend = HttpBackend::new(&config.backend, sessions.clone(), clock.clone())?;
        let store = CheckoutStore::hydrate(Arc::new(FileCheckoutPersistence::new(
            config.storage.checkout_path.clone(),
        )));

        Ok(Self {
            backend: Arc::new(backend),
            sessions,
            store: Arc::new(store),
            clock,
            rules: config.checkout.clone(),
            polling: config.polling.clone(),
        })
    }

    pub fn catalog(&self) -> EventCatalog {
        EventCatalog::new(self.backend.clone())
    }

    pub fn confirmation(&self, transaction_id: i64) -> PaymentConfirmation {
        PaymentConfirmation::new(
            transaction_id,
            self.backend.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.rules.clone(),
            PollPolicy::from(&self.polling),
        )
        .with_tick(self.polling.tick())
    }
}
