use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub checkout: CheckoutRules,
    pub polling: PollingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub session_path: PathBuf,
    pub checkout_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_path: PathBuf::from(".gatepass/session.json"),
            checkout_path: PathBuf::from(".gatepass/checkout.json"),
        }
    }
}

/// Client-side mirrors of the backend's purchase rules
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CheckoutRules {
    pub max_tickets_per_transaction: u32,
    pub payment_window_minutes: i64,
    pub admin_window_hours: i64,
}

impl Default for CheckoutRules {
    fn default() -> Self {
        Self {
            max_tickets_per_transaction: 3,
            payment_window_minutes: 120,
            admin_window_hours: 72,
        }
    }
}

impl CheckoutRules {
    pub fn payment_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.payment_window_minutes)
    }

    pub fn admin_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.admin_window_hours)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub tick_millis: u64,
    pub jitter_millis: u64,
    pub max_attempts: Option<u32>,
    pub max_consecutive_failures: u32,
    pub backoff_cap_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 20,
            tick_millis: 1000,
            jitter_millis: 0,
            max_attempts: None,
            max_consecutive_failures: 5,
            backoff_cap_secs: 300,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new("config"))
    }

    pub fn load_from(dir: &Path) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let file = |name: &str| dir.join(name).to_string_lossy().into_owned();

        let s = config::Config::builder()
            // Every file is optional; struct defaults fill the gaps
            .add_source(config::File::with_name(&file("default")).required(false))
            .add_source(config::File::with_name(&file(&run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name(&file("local")).required(false))
            // Eg. `GATEPASS__BACKEND__BASE_URL=https://api.example.com`
            .add_source(
                config::Environment::with_prefix("GATEPASS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
