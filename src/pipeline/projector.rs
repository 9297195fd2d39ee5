//! The projector loop: intake, ordering, dispatch, retry, dead-letter.

use std::future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::dead_letter::DeadLetterLog;
use super::reorder::ReorderBuffer;
use super::retry::{DeferredQueue, Parked, RetryPolicy};
use crate::domain::{EventEnvelope, LedgerEvent};
use crate::projection::{Outcome, ProjectionEngine, ProjectionError, RetryClass};

/// Tuning of the projector loop.
#[derive(Debug, Clone)]
pub struct ProjectorSettings {
    /// Backoff for transient failures.
    pub retry: RetryPolicy,
    /// Deferred attempts allowed for an event whose entity is unknown.
    pub unknown_entity_max_attempts: u32,
    /// Wait between deferred attempts.
    pub unknown_entity_delay: Duration,
    /// Slots the source must advance before an event is released.
    pub reorder_slots: u64,
    /// Longest time an event is held for reordering.
    pub reorder_delay: Duration,
}

impl Default for ProjectorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            unknown_entity_max_attempts: 20,
            unknown_entity_delay: Duration::from_millis(500),
            reorder_slots: 2,
            reorder_delay: Duration::from_millis(400),
        }
    }
}

/// Counters reported when the projector stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectorStats {
    /// Events taken off the queue.
    pub received: u64,
    /// Events whose mutation was committed.
    pub applied: u64,
    /// Redelivered events recognised as already applied.
    pub duplicates: u64,
    /// Events that were valid no-ops.
    pub skipped: u64,
    /// Times an event was parked on an unknown entity.
    pub deferred: u64,
    /// Events written to the dead-letter log.
    pub dead_lettered: u64,
}

/// Drives a [`ProjectionEngine`] from a queue of envelopes.
///
/// Events are released from a [`ReorderBuffer`] in position order.
/// Transient failures are retried inline with backoff; unknown-entity
/// failures are parked per entity in a [`DeferredQueue`]; everything else
/// goes to the [`DeadLetterLog`].
#[derive(Debug)]
pub struct Projector {
    engine: ProjectionEngine,
    dead_letters: DeadLetterLog,
    settings: ProjectorSettings,
    reorder: ReorderBuffer,
    deferred: DeferredQueue,
    stats: ProjectorStats,
}

enum Attempt {
    Done,
    Blocked(Parked),
}

impl Projector {
    /// Creates a projector.
    #[must_use]
    pub fn new(
        engine: ProjectionEngine,
        dead_letters: DeadLetterLog,
        settings: ProjectorSettings,
    ) -> Self {
        let reorder = ReorderBuffer::new(settings.reorder_slots, settings.reorder_delay);
        let deferred = DeferredQueue::new(settings.unknown_entity_delay);
        Self {
            engine,
            dead_letters,
            settings,
            reorder,
            deferred,
            stats: ProjectorStats::default(),
        }
    }

    /// Runs until `shutdown` flips to `true` or the queue closes.
    ///
    /// On the way out, envelopes still queued are drained and applied in
    /// order, and anything still parked is dead-lettered for replay.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<EventEnvelope>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ProjectorStats {
        tracing::info!("projector started");
        loop {
            let deadline = earliest(self.reorder.next_deadline(), self.deferred.next_deadline());
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = events.recv() => match received {
                    Some(envelope) => self.accept(envelope),
                    None => break,
                },
                () = timer => {}
            }

            self.release_ready().await;
            self.retry_due().await;
        }

        self.finish(events).await;
        self.stats
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> ProjectorStats {
        self.stats
    }

    fn accept(&mut self, envelope: EventEnvelope) {
        self.stats.received += 1;
        tracing::debug!(kind = %envelope.kind, slot = envelope.slot, index = envelope.index, "event received");
        self.reorder.push(envelope, Instant::now());
    }

    async fn release_ready(&mut self) {
        for envelope in self.reorder.pop_ready(Instant::now()) {
            self.process(envelope).await;
        }
    }

    async fn finish(&mut self, mut events: mpsc::Receiver<EventEnvelope>) {
        events.close();
        while let Ok(envelope) = events.try_recv() {
            self.accept(envelope);
        }
        let buffered = self.reorder.drain();
        tracing::info!(buffered = buffered.len(), parked = self.deferred.len(), "projector flushing");
        for envelope in buffered {
            self.process(envelope).await;
        }
        self.retry_due().await;

        for parked in self.deferred.drain() {
            let (kind, message) = match &parked.last_error {
                Some(err) => (err.label(), err.to_string()),
                None => ("unknown_entity", "parked behind an unresolved event".to_string()),
            };
            self.dead_letter(&parked.envelope, kind, &message, parked.attempts)
                .await;
        }
        tracing::info!(
            received = self.stats.received,
            applied = self.stats.applied,
            duplicates = self.stats.duplicates,
            skipped = self.stats.skipped,
            dead_lettered = self.stats.dead_lettered,
            "projector stopped"
        );
    }

    /// Handles one event released by the reorder buffer.
    async fn process(&mut self, envelope: EventEnvelope) {
        let event = match envelope.decode() {
            Ok(event) => event,
            Err(e) => {
                let err = ProjectionError::from(e);
                tracing::error!(kind = %envelope.kind, payload = %envelope.payload, error = %err, "undecodable event");
                self.dead_letter(&envelope, err.label(), &err.to_string(), 1)
                    .await;
                return;
            }
        };

        let key = event.entity_key().to_string();
        // A creation is what parked events on its key wait for, so it
        // never queues behind them.
        let creates_entity = matches!(event, LedgerEvent::PairCreated(_));
        if !creates_entity && self.deferred.is_blocked(&key) {
            tracing::debug!(entity = %key, slot = envelope.slot, "entity has parked events; parking behind them");
            self.deferred
                .park(&key, envelope, 0, None, Instant::now());
            return;
        }

        if let Attempt::Blocked(parked) = self.attempt(&event, Parked::new(envelope)).await {
            self.stats.deferred += 1;
            self.deferred.repark_head(&key, parked, Instant::now());
        }
    }

    /// Retries the head of every due key, draining each key as far as it goes.
    async fn retry_due(&mut self) {
        for key in self.deferred.due_keys(Instant::now()) {
            while let Some(parked) = self.deferred.pop_head(&key) {
                let event = match parked.envelope.decode() {
                    Ok(event) => event,
                    Err(e) => {
                        let err = ProjectionError::from(e);
                        self.dead_letter(&parked.envelope, err.label(), &err.to_string(), parked.attempts)
                            .await;
                        continue;
                    }
                };
                if let Attempt::Blocked(parked) = self.attempt(&event, parked).await {
                    self.stats.deferred += 1;
                    self.deferred.repark_head(&key, parked, Instant::now());
                    break;
                }
            }
        }
    }

    /// Dispatches one event with inline backoff.
    ///
    /// Returns [`Attempt::Blocked`] when the event should stay parked on
    /// its entity; every other result has been fully handled.
    async fn attempt(&mut self, event: &LedgerEvent, mut parked: Parked) -> Attempt {
        let mut tries = 0u32;
        let result = loop {
            tries += 1;
            match self.engine.dispatch(&parked.envelope).await {
                Err(err)
                    if err.retry_class() == RetryClass::Backoff
                        && self.settings.retry.allows_another(tries) =>
                {
                    let delay = self.settings.retry.delay_after(tries);
                    tracing::warn!(
                        kind = %event.kind(),
                        entity = %event.entity_key(),
                        attempt = tries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        };

        match result {
            Ok(outcome) => {
                self.record_outcome(event, &outcome);
                if matches!((event, &outcome), (LedgerEvent::PairCreated(_), Outcome::Applied)) {
                    self.deferred.wake(event.entity_key(), Instant::now());
                }
                Attempt::Done
            }
            Err(err) if err.retry_class() == RetryClass::Defer => {
                parked.attempts += 1;
                if parked.attempts >= self.settings.unknown_entity_max_attempts {
                    tracing::error!(entity = %event.entity_key(), attempts = parked.attempts, error = %err, "entity never appeared");
                    self.dead_letter(&parked.envelope, err.label(), &err.to_string(), parked.attempts)
                        .await;
                    return Attempt::Done;
                }
                tracing::info!(entity = %event.entity_key(), attempts = parked.attempts, error = %err, "deferring event");
                parked.last_error = Some(err);
                Attempt::Blocked(parked)
            }
            Err(err) => {
                tracing::error!(
                    kind = %event.kind(),
                    entity = %event.entity_key(),
                    slot = parked.envelope.slot,
                    payload = %parked.envelope.payload,
                    error = %err,
                    "event failed"
                );
                let attempts = parked.attempts.saturating_add(tries);
                self.dead_letter(&parked.envelope, err.label(), &err.to_string(), attempts)
                    .await;
                Attempt::Done
            }
        }
    }

    fn record_outcome(&mut self, event: &LedgerEvent, outcome: &Outcome) {
        match outcome {
            Outcome::Applied => self.stats.applied += 1,
            Outcome::Duplicate => {
                self.stats.duplicates += 1;
                tracing::debug!(kind = %event.kind(), entity = %event.entity_key(), "duplicate event");
            }
            Outcome::Skipped(reason) => {
                self.stats.skipped += 1;
                tracing::debug!(kind = %event.kind(), entity = %event.entity_key(), ?reason, "event skipped");
            }
        }
    }

    async fn dead_letter(&mut self, envelope: &EventEnvelope, kind: &str, error: &str, attempts: u32) {
        self.stats.dead_lettered += 1;
        match self.dead_letters.record(envelope, kind, error, attempts).await {
            Ok(entry) => {
                tracing::warn!(id = %entry.id, kind = %envelope.kind, slot = envelope.slot, error_kind = kind, "event dead-lettered");
            }
            Err(e) => {
                tracing::error!(
                    path = %self.dead_letters.path().display(),
                    kind = %envelope.kind,
                    payload = %envelope.payload,
                    error = %e,
                    "failed to write dead letter"
                );
            }
        }
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
