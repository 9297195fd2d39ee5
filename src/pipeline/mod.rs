//! Delivery pipeline between the event source and the projection engine.
//!
//! ```text
//! mpsc<EventEnvelope> ─▶ ReorderBuffer ─▶ ProjectionEngine::dispatch
//!                                             │
//!                         ┌───── Defer ───────┤
//!                         ▼                   ├── Backoff (inline retry)
//!                   DeferredQueue             └── Never ─▶ DeadLetterLog
//! ```

pub mod dead_letter;
pub mod projector;
pub mod reorder;
pub mod retry;

pub use dead_letter::{DeadLetter, DeadLetterLog};
pub use projector::{Projector, ProjectorSettings, ProjectorStats};
pub use reorder::ReorderBuffer;
pub use retry::{DeferredQueue, Parked, RetryPolicy};
