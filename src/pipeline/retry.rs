use std::time::Duration;

use rand::Rng;

use super::StageError;

/// Central redelivery policy for transient stage failures.
///
/// Applied by the controller at the queue layer; stages themselves never
/// loop on errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: std::env::var("STAGE_RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            base_delay: std::env::var("STAGE_RETRY_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_delay: defaults.max_delay,
        }
    }

    /// Whether a failure on delivery `attempt` (1-based) should be
    /// redelivered rather than committed as permanent.
    pub fn allows_retry(&self, error: &StageError, attempt: u32) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Exponential backoff with jitter before redelivery `attempt + 1`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = self.base_delay.saturating_mul(2u32.pow(exp));
        let capped = base.min(self.max_delay);
        let jitter_ms = rand::rng().random_range(0..=capped.as_millis().max(1) as u64 / 4);
        capped + Duration::from_millis(jitter_ms)
    }
}
