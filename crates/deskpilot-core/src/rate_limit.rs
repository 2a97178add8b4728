//! Per-key cooldown ledger.
//!
//! Keys name a rate-limit bucket (a command, a shared action such as
//! `capture`, or a panel button id). Each key has its own cooldown; the
//! check-and-record step runs under one lock so that two concurrent
//! invocations of the same key never both pass.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A cooldown is still active for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttled {
    /// Whole seconds until the key may be used again (rounded up, at least 1).
    pub remaining_secs: u64,
}

/// Cooldown gate keyed by string.
#[derive(Debug, Default)]
pub struct RateLimiter {
    cooldowns: HashMap<String, Duration>,
    /// Applied to keys without an explicit cooldown.
    default_cooldown: Duration,
    ledger: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Create a limiter where unknown keys are never throttled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a limiter applying `cooldown` to every key.
    #[must_use]
    pub fn uniform(cooldown: Duration) -> Self {
        Self {
            default_cooldown: cooldown,
            ..Self::default()
        }
    }

    /// Configure the cooldown for one key.
    #[must_use]
    pub fn with_cooldown(mut self, key: impl Into<String>, cooldown: Duration) -> Self {
        self.cooldowns.insert(key.into(), cooldown);
        self
    }

    /// Cooldown configured for `key`.
    #[must_use]
    pub fn cooldown(&self, key: &str) -> Duration {
        self.cooldowns
            .get(key)
            .copied()
            .unwrap_or(self.default_cooldown)
    }

    /// Check the cooldown for `key` and, if it has elapsed, record now.
    ///
    /// A rejected call does not touch the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`Throttled`] with the remaining wait while the cooldown runs.
    pub fn try_acquire(&self, key: &str) -> Result<(), Throttled> {
        let cooldown = self.cooldown(key);
        if cooldown.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = ledger.get(key) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < cooldown {
                let remaining_secs = whole_secs_ceil(cooldown - elapsed);
                debug!(key, remaining_secs, "Cooldown active");
                return Err(Throttled { remaining_secs });
            }
        }

        ledger.insert(key.to_string(), now);
        Ok(())
    }
}

fn whole_secs_ceil(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}
