use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum DebounceState<T> {
    Idle,
    Pending { value: T, deadline: Instant },
}

/// Holds back a value until no new input arrived for `window`.
#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    state: DebounceState<T>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    /// Replaces any pending value and restarts the window.
    pub fn input(&mut self, value: T, now: Instant) {
        let deadline = now + self.window;
        trace!("Debounce armed, deadline in {}ms", self.window.as_millis());
        self.state = DebounceState::Pending { value, deadline };
    }

    /// Returns the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let expired = matches!(
            &self.state,
            DebounceState::Pending { deadline, .. } if now >= *deadline
        );
        if expired { self.take() } else { None }
    }

    /// Drops the pending value.
    pub fn cancel(&mut self) {
        if self.is_pending() {
            self.state = DebounceState::Idle;
            trace!("Debounce canceled");
        }
    }

    fn take(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.state, DebounceState::Idle) {
            DebounceState::Pending { value, .. } => Some(value),
            DebounceState::Idle => None,
        }
    }
}
