// src/engine/backoff.rs

use std::time::Duration;

/// Delay until the next tick.
///
/// Ticks with errors double the delay up to `max`; a clean tick resets it to
/// the reconcile interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    pub fn reconfigure(&mut self, base: Duration, max: Duration) {
        *self = Backoff::new(base, max);
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record the outcome of a tick and return the delay before the next one.
    pub fn next_delay(&mut self, had_errors: bool) -> Duration {
        self.current = if had_errors {
            self.current.saturating_mul(2).min(self.max)
        } else {
            self.base
        };
        self.current
    }
}
