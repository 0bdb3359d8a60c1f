use gatepass_store::app_config::PollingConfig;
use rand::Rng;
use std::time::Duration;

/// Cadence of transaction status polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Upper bound of the random delay added to each wait
    pub jitter: Duration,
    pub max_attempts: Option<u32>,
    pub max_consecutive_failures: u32,
    pub backoff_cap: Duration,
}

impl PollPolicy {
    /// Fixed cadence, no jitter, no attempt limit
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            jitter: Duration::ZERO,
            max_attempts: None,
            max_consecutive_failures: 5,
            backoff_cap: Duration::from_secs(300),
        }
    }

    /// Wait before the next poll. Each consecutive failure doubles the
    /// interval, up to `backoff_cap`.
    pub fn delay_after<R: Rng + ?Sized>(&self, consecutive_failures: u32, rng: &mut R) -> Duration {
        let factor = 2u32.saturating_pow(consecutive_failures.min(16));
        let base = self.interval.saturating_mul(factor);
        let base = if consecutive_failures > 0 {
            base.min(self.backoff_cap.max(self.interval))
        } else {
            base
        };

        if self.jitter.is_zero() {
            return base;
        }
        let jitter_ms = rng.gen_range(0..=self.jitter.as_millis() as u64);
        base + Duration::from_millis(jitter_ms)
    }

    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.map(|max| attempts >= max).unwrap_or(false)
    }

    pub fn failures_exhausted(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.max_consecutive_failures
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            jitter: Duration::from_millis(config.jitter_millis),
            max_attempts: config.max_attempts,
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            backoff_cap: Duration::from_secs(config.backoff_cap_secs),
        }
    }
}
