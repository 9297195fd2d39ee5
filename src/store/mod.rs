//! View store: durable, atomically replaced record collections.
//!
//! A [`ViewStore`] keeps one JSON document per [`Collection`]. Every write
//! replaces whole collections, and a single [`ViewStore::commit`] may
//! replace several at once: after a crash a later `load` sees either
//! every collection of the batch at its new version or every one at its
//! old version.
//!
//! [`Views`] layers typed access and I/O timeouts on top of a store.
//! Backends: [`FileViewStore`] (default), [`PostgresViewStore`], and
//! [`InMemoryViewStore`] for tests.

pub mod file;
pub mod memory;
pub mod postgres;
pub mod views;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use file::FileViewStore;
pub use memory::InMemoryViewStore;
pub use postgres::{PostgresSettings, PostgresViewStore};
pub use views::{ViewBatch, Views};

/// Named record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Pair registry.
    Pairs,
    /// Swap history.
    Swaps,
    /// Ad-slot request log.
    Requests,
}

impl Collection {
    /// All collections, in lock acquisition order.
    pub const ALL: [Self; 3] = [Self::Pairs, Self::Swaps, Self::Requests];

    /// Stable storage name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pairs => "pairs",
            Self::Swaps => "swaps",
            Self::Requests => "requests",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// View store failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Underlying I/O failed; the operation may succeed if retried.
    #[error("store i/o error: {0}")]
    Io(String),

    /// The operation did not complete within the configured timeout.
    #[error("store operation timed out: {0}")]
    Timeout(String),

    /// Database backend failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A collection's durable representation cannot be decoded.
    #[error("collection {collection} is corrupt: {reason}")]
    Corrupt {
        /// The affected collection.
        collection: Collection,
        /// Decoder message.
        reason: String,
    },

    /// The store's manifest cannot be decoded, so no collection is
    /// reachable. Raised when opening a store.
    #[error("store manifest is corrupt: {0}")]
    CorruptManifest(String),
}

impl StoreError {
    /// Returns `true` for failures worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Corrupt { .. } | Self::CorruptManifest(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Durable storage of whole collections.
///
/// Implementations must make [`commit`](Self::commit) all-or-nothing
/// across every collection in the batch.
#[async_trait::async_trait]
pub trait ViewStore: Send + Sync + fmt::Debug {
    /// Loads a collection document, or `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the stored bytes are not valid
    /// JSON, or a transient error on I/O failure.
    async fn load(&self, collection: Collection) -> Result<Option<serde_json::Value>, StoreError>;

    /// Atomically replaces every collection in `batch`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the batch could not be made durable;
    /// the previous versions stay in place.
    async fn commit(&self, batch: Vec<(Collection, serde_json::Value)>) -> Result<(), StoreError>;

    /// Replaces a single collection.
    ///
    /// # Errors
    ///
    /// See [`commit`](Self::commit).
    async fn store(
        &self,
        collection: Collection,
        document: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.commit(vec![(collection, document)]).await
    }
}
