//! Random start delay for scheduled backups.
//!
//! Many installations share the same default schedule. A bounded random
//! delay before each run keeps their backups from hitting shared storage
//! at the same second.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound for the delay applied before a scheduled run.
///
/// ```
/// use backup_scheduler::JitterConfig;
///
/// let jitter = JitterConfig::new(30);
/// assert!(jitter.generate_jitter() < std::time::Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct JitterConfig {
    /// Maximum delay in seconds (0 = none)
    pub max_jitter_secs: u64,
}

impl JitterConfig {
    pub fn new(max_jitter_secs: u64) -> Self {
        Self { max_jitter_secs }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.max_jitter_secs > 0
    }

    /// Pick a delay in `[0, max_jitter_secs)` with millisecond resolution.
    pub fn generate_jitter(&self) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..self.max_jitter_secs * 1000);
        Duration::from_millis(jitter_ms)
    }

    /// Sleep for a freshly generated delay.
    pub async fn delay(&self) {
        let jitter = self.generate_jitter();
        if !jitter.is_zero() {
            debug!(jitter_ms = jitter.as_millis() as u64, "Delaying scheduled run");
            tokio::time::sleep(jitter).await;
        }
    }
}
