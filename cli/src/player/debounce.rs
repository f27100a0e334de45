//! Trailing-edge debouncing of repeated user input.

use std::time::Duration;

use tokio::time::Instant;

/// Holds back a value until no newer one arrived for `wait`.
///
/// Every [`Debouncer::trigger`] replaces the pending value and restarts the wait, so a burst of
/// triggers results in a single value: the last one.
#[derive(Debug)]
pub struct Debouncer<T> {
    wait: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub const fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: None,
        }
    }

    pub fn trigger(&mut self, value: T) {
        self.pending = Some((value, Instant::now() + self.wait));
    }

    /// When the pending value becomes due, if there is one.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    /// Take the pending value if its wait is over.
    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, at)) if *at <= now => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }
}
