//! Per-key exponential retry delays.

use crate::trigger::Fingerprint;
use edgeward_config::BackoffConfig;
use edgeward_core::ObjectKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Failures {
    count: u32,
    retry_at: Instant,
    fingerprint: Fingerprint,
}

/// Tracks consecutive failed passes per key. The delay after the n-th
/// consecutive failure is `base * 2^(n-1)`, capped at `max`. There is no
/// retry limit.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    failures: Mutex<HashMap<ObjectKey, Failures>>,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failed pass over `fingerprint` and return the retry delay.
    pub fn record_failure(&self, key: &ObjectKey, fingerprint: Fingerprint) -> Duration {
        self.record_failure_at(key, fingerprint, Instant::now())
    }

    fn record_failure_at(&self, key: &ObjectKey, fingerprint: Fingerprint, now: Instant) -> Duration {
        let mut failures = self.failures.lock();
        let count = failures.get(key).map_or(0, |f| f.count) + 1;
        let delay = self.delay_for(count);
        failures.insert(
            key.clone(),
            Failures {
                count,
                retry_at: now + delay,
                fingerprint,
            },
        );
        delay
    }

    /// Time left before the same inputs may be retried. `None` when the key
    /// has not failed, the inputs changed, or the delay has elapsed.
    pub fn hold(&self, key: &ObjectKey, fingerprint: &Fingerprint) -> Option<Duration> {
        self.hold_at(key, fingerprint, Instant::now())
    }

    fn hold_at(&self, key: &ObjectKey, fingerprint: &Fingerprint, now: Instant) -> Option<Duration> {
        let failures = self.failures.lock();
        let failed = failures.get(key)?;
        if &failed.fingerprint != fingerprint {
            return None;
        }
        let remaining = failed.retry_at.saturating_duration_since(now);
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Delay before the first retry.
    pub fn base(&self) -> Duration {
        self.config.base
    }

    pub fn reset(&self, key: &ObjectKey) {
        self.failures.lock().remove(key);
    }

    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures.lock().get(key).map_or(0, |f| f.count)
    }

    fn delay_for(&self, count: u32) -> Duration {
        let factor = 1u32.checked_shl(count.saturating_sub(1)).unwrap_or(u32::MAX);
        self.config.base.saturating_mul(factor).min(self.config.max)
    }
}
