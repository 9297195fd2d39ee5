//! Retry policy and the deferred queue for events waiting on an entity.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::EventEnvelope;
use crate::projection::ProjectionError;

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Returns `true` if another attempt is allowed after `attempts`.
    #[must_use]
    pub const fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// An event waiting for its entity to appear.
#[derive(Debug, Clone)]
pub struct Parked {
    /// The waiting event.
    pub envelope: EventEnvelope,
    /// Deferred attempts made so far.
    pub attempts: u32,
    /// Error from the most recent attempt, if it was attempted.
    pub last_error: Option<ProjectionError>,
    due: Instant,
}

impl Parked {
    /// Wraps an event that has not been attempted yet.
    #[must_use]
    pub fn new(envelope: EventEnvelope) -> Self {
        Self {
            envelope,
            attempts: 0,
            last_error: None,
            due: Instant::now(),
        }
    }
}

/// Per-entity FIFO queues of events deferred on `UnknownEntity`.
///
/// While a key has parked events, every later event for that key is
/// parked behind them so entity order is preserved.
#[derive(Debug)]
pub struct DeferredQueue {
    queues: HashMap<String, VecDeque<Parked>>,
    delay: Duration,
}

impl DeferredQueue {
    /// Creates an empty queue that retries after `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            queues: HashMap::new(),
            delay,
        }
    }

    /// Returns `true` if `key` has parked events.
    #[must_use]
    pub fn is_blocked(&self, key: &str) -> bool {
        self.queues.contains_key(key)
    }

    /// Parks an event at the back of `key`'s queue.
    pub fn park(
        &mut self,
        key: &str,
        envelope: EventEnvelope,
        attempts: u32,
        last_error: Option<ProjectionError>,
        now: Instant,
    ) {
        let parked = Parked {
            envelope,
            attempts,
            last_error,
            due: now + self.delay,
        };
        self.queues.entry(key.to_string()).or_default().push_back(parked);
    }

    /// Puts a just-retried event back at the head of its queue.
    pub fn repark_head(&mut self, key: &str, mut parked: Parked, now: Instant) {
        parked.due = now + self.delay;
        self.queues.entry(key.to_string()).or_default().push_front(parked);
    }

    /// Takes the head of `key`'s queue, dropping the queue when it empties.
    pub fn pop_head(&mut self, key: &str) -> Option<Parked> {
        let queue = self.queues.get_mut(key)?;
        let head = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(key);
        }
        head
    }

    /// Makes `key`'s head due immediately.
    pub fn wake(&mut self, key: &str, now: Instant) {
        if let Some(head) = self.queues.get_mut(key).and_then(VecDeque::front_mut) {
            head.due = now;
        }
    }

    /// Keys whose head is due at `now`, sorted for determinism.
    #[must_use]
    pub fn due_keys(&self, now: Instant) -> Vec<String> {
        let mut keys: Vec<String> = self
            .queues
            .iter()
            .filter(|(_, queue)| queue.front().is_some_and(|head| head.due <= now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Earliest instant at which some head becomes due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queues
            .values()
            .filter_map(|queue| queue.front().map(|head| head.due))
            .min()
    }

    /// Number of parked events across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Returns `true` if nothing is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Removes everything, each key's events in order.
    pub fn drain(&mut self) -> Vec<Parked> {
        let mut keys: Vec<String> = self.queues.keys().cloned().collect();
        keys.sort_unstable();
        keys.into_iter()
            .filter_map(|key| self.queues.remove(&key))
            .flatten()
            .collect()
    }
}
