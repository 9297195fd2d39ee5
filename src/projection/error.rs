//! Projection outcomes and failure taxonomy.

use crate::domain::{DecodeError, EventKind, EventPosition, RequestStatus};
use crate::store::{Collection, StoreError};

/// Successful result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The event's mutation was committed.
    Applied,
    /// The event had already been applied; nothing changed.
    Duplicate,
    /// The event targets nothing that can change; nothing changed.
    Skipped(SkipReason),
}

/// Why an event was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No request matches the resolution.
    RequestNotFound,
    /// The matched request is already terminal.
    AlreadyTerminal(RequestStatus),
}

/// How the projector should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Retry in place with exponential backoff.
    Backoff,
    /// Park the event and retry after a delay, keeping entity order.
    Defer,
    /// Dead-letter immediately.
    Never,
}

/// Failure while projecting one event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    /// Store or account I/O failed or timed out.
    #[error("transient i/o failure: {0}")]
    TransientIo(String),

    /// The referenced entity has not been materialised yet.
    #[error("{kind} references unknown entity {key}")]
    UnknownEntity {
        /// Kind of the event being applied.
        kind: EventKind,
        /// Key of the missing entity.
        key: String,
    },

    /// The event cannot be interpreted.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A collection the event needs cannot be decoded.
    #[error("collection {collection} is corrupt: {reason}")]
    StorageCorruption {
        /// The corrupt collection.
        collection: Collection,
        /// Decoder message.
        reason: String,
    },

    /// The store manifest cannot be decoded, so no collection is readable.
    #[error("store manifest is corrupt: {0}")]
    ManifestCorruption(String),

    /// A swap arrived behind a newer swap already applied to its pair.
    #[error("swap at {position} on {pair_key} arrived after {last}")]
    OutOfOrder {
        /// Pair the swap targets.
        pair_key: String,
        /// Position of the late swap.
        position: EventPosition,
        /// Position of the newest applied swap.
        last: EventPosition,
    },
}

impl ProjectionError {
    /// Retry policy class for this failure.
    #[must_use]
    pub const fn retry_class(&self) -> RetryClass {
        match self {
            Self::TransientIo(_) => RetryClass::Backoff,
            Self::UnknownEntity { .. } => RetryClass::Defer,
            Self::MalformedPayload(_)
            | Self::StorageCorruption { .. }
            | Self::ManifestCorruption(_)
            | Self::OutOfOrder { .. } => RetryClass::Never,
        }
    }

    /// Short machine-readable label used in logs and dead letters.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::TransientIo(_) => "transient_io",
            Self::UnknownEntity { .. } => "unknown_entity",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::StorageCorruption { .. } | Self::ManifestCorruption(_) => "storage_corruption",
            Self::OutOfOrder { .. } => "out_of_order",
        }
    }
}

impl From<StoreError> for ProjectionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { collection, reason } => {
                Self::StorageCorruption { collection, reason }
            }
            StoreError::CorruptManifest(reason) => Self::ManifestCorruption(reason),
            other => Self::TransientIo(other.to_string()),
        }
    }
}

impl From<DecodeError> for ProjectionError {
    fn from(err: DecodeError) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_by_permanence() {
        let corrupt = ProjectionError::from(StoreError::Corrupt {
            collection: Collection::Swaps,
            reason: "bad".to_string(),
        });
        assert_eq!(corrupt.retry_class(), RetryClass::Never);
        assert_eq!(corrupt.label(), "storage_corruption");

        let manifest = ProjectionError::from(StoreError::CorruptManifest("eof".to_string()));
        assert_eq!(manifest.retry_class(), RetryClass::Never);
        assert_eq!(manifest.label(), "storage_corruption");

        let io = ProjectionError::from(StoreError::Timeout("commit".to_string()));
        assert_eq!(io.retry_class(), RetryClass::Backoff);
    }

    #[test]
    fn unknown_entity_is_deferred() {
        let err = ProjectionError::UnknownEntity {
            kind: EventKind::SwapExecuted,
            key: "pair-1".to_string(),
        };
        assert_eq!(err.retry_class(), RetryClass::Defer);
        assert_eq!(err.to_string(), "SwapExecuted references unknown entity pair-1");
    }
}
