//! Retry-with-backoff as an explicit state machine.
//!
//! ```text
//! Attempting(n) --ok--------------------------------> done
//! Attempting(n) --transient, n < max--> BackingOff(n+1, base * 2^n) --> Attempting(n+1)
//! Attempting(n) --permanent | n == max--> Fallback(error)
//! ```

use std::time::Duration;

use crate::errors::BackendError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retry bound and backoff base for one logical backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

/// Where a call currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptState {
    /// About to issue attempt `attempt` (0-based).
    Attempting { attempt: u32 },
    /// Waiting `delay` before issuing `next_attempt`.
    BackingOff { next_attempt: u32, delay: Duration },
    /// No further attempts; the caller falls back.
    Fallback {
        attempts: u32,
        error: BackendError,
    },
}

impl RetryPolicy {
    pub fn initial(&self) -> AttemptState {
        AttemptState::Attempting { attempt: 0 }
    }

    /// Backoff delay before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Transition out of a failed `attempt`.
    pub fn after_failure(&self, attempt: u32, error: BackendError) -> AttemptState {
        if error.is_transient() && attempt < self.max_retries {
            AttemptState::BackingOff {
                next_attempt: attempt + 1,
                delay: self.delay_for(attempt),
            }
        } else {
            AttemptState::Fallback {
                attempts: attempt + 1,
                error,
            }
        }
    }

    /// Total attempts the policy allows for an always-transient backend.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
