//! Position-ordered holding buffer for incoming events.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{EventEnvelope, EventPosition};

#[derive(Debug)]
struct Held {
    envelope: EventEnvelope,
    arrived: Instant,
}

/// Holds events briefly and releases them in [`EventPosition`] order.
///
/// The event at the head of the buffer is released once the source has
/// moved `reorder_slots` past its slot, or once it has waited
/// `reorder_delay`. Release is strictly from the head, so consumers always
/// see non-decreasing positions within one buffering window.
#[derive(Debug)]
pub struct ReorderBuffer {
    held: BTreeMap<(EventPosition, u64), Held>,
    reorder_slots: u64,
    reorder_delay: Duration,
    highest_slot: u64,
    arrivals: u64,
}

impl ReorderBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new(reorder_slots: u64, reorder_delay: Duration) -> Self {
        Self {
            held: BTreeMap::new(),
            reorder_slots,
            reorder_delay,
            highest_slot: 0,
            arrivals: 0,
        }
    }

    /// Adds an event that arrived at `now`.
    pub fn push(&mut self, envelope: EventEnvelope, now: Instant) {
        self.highest_slot = self.highest_slot.max(envelope.slot);
        // Arrival counter keeps redelivered copies of one position apart.
        let key = (envelope.position(), self.arrivals);
        self.arrivals = self.arrivals.wrapping_add(1);
        self.held.insert(
            key,
            Held {
                envelope,
                arrived: now,
            },
        );
    }

    /// Removes and returns every event that is ready at `now`, in order.
    pub fn pop_ready(&mut self, now: Instant) -> Vec<EventEnvelope> {
        let mut ready = Vec::new();
        while let Some((_, head)) = self.held.first_key_value() {
            if !self.is_ready(head, now) {
                break;
            }
            if let Some((_, held)) = self.held.pop_first() {
                ready.push(held.envelope);
            }
        }
        ready
    }

    /// Removes and returns everything, in order.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.held)
            .into_values()
            .map(|held| held.envelope)
            .collect()
    }

    /// Instant at which the head becomes ready by age.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.held
            .first_key_value()
            .map(|(_, held)| held.arrived + self.reorder_delay)
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    fn is_ready(&self, held: &Held, now: Instant) -> bool {
        held.envelope.slot.saturating_add(self.reorder_slots) <= self.highest_slot
            || now.saturating_duration_since(held.arrived) >= self.reorder_delay
    }
}
