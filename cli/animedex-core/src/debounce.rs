//! Emit a value only after it has been stable for a while.
//!
//! [Debouncer] doesn't own any timers. Each [Debouncer::push] hands out a
//! ticket that the caller redeems after the settle window elapsed; only the
//! ticket of the most recent push yields its value.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A pushed value waiting for its settle window to pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceTicket<T> {
    generation: u64,
    value: T,
}

impl<T> DebounceTicket<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

#[derive(Debug, Default)]
pub struct Debouncer {
    generation: u64,
}

impl Debouncer {
    /// Start a new settle window for `value`, superseding all earlier ones.
    pub fn push<T>(&mut self, value: T) -> DebounceTicket<T> {
        self.generation += 1;
        DebounceTicket {
            generation: self.generation,
            value,
        }
    }

    /// The ticket's value, if nothing was pushed (or cancelled) after it.
    pub fn settle<T>(&self, ticket: DebounceTicket<T>) -> Option<T> {
        (ticket.generation == self.generation).then_some(ticket.value)
    }

    /// Invalidate every outstanding ticket.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }
}

/// Wait out the settle window of `ticket`.
///
/// The window starts when this is called, not when the future is first
/// polled.
pub fn settle_after<T>(
    ticket: DebounceTicket<T>,
    window: Duration,
) -> impl Future<Output = DebounceTicket<T>> {
    let deadline = Instant::now() + window;
    async move {
        tokio::time::sleep_until(deadline).await;
        ticket
    }
}
