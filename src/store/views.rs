//! Typed access to the view collections.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Collection, StoreError, ViewStore};
use crate::domain::{AdRequest, Pair, Swap};

/// Set of collection replacements committed as one unit.
#[derive(Debug, Default)]
pub struct ViewBatch {
    pairs: Option<Vec<Pair>>,
    swaps: Option<Vec<Swap>>,
    requests: Option<Vec<AdRequest>>,
}

impl ViewBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pair registry.
    #[must_use]
    pub fn with_pairs(mut self, pairs: Vec<Pair>) -> Self {
        self.pairs = Some(pairs);
        self
    }

    /// Replaces the swap history.
    #[must_use]
    pub fn with_swaps(mut self, swaps: Vec<Swap>) -> Self {
        self.swaps = Some(swaps);
        self
    }

    /// Replaces the request log.
    #[must_use]
    pub fn with_requests(mut self, requests: Vec<AdRequest>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Returns `true` if the batch replaces nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pairs.is_none() && self.swaps.is_none() && self.requests.is_none()
    }

    fn into_documents(self) -> Result<Vec<(Collection, serde_json::Value)>, StoreError> {
        let mut documents = Vec::with_capacity(3);
        if let Some(pairs) = self.pairs {
            documents.push((Collection::Pairs, encode(Collection::Pairs, &pairs)?));
        }
        if let Some(swaps) = self.swaps {
            documents.push((Collection::Swaps, encode(Collection::Swaps, &swaps)?));
        }
        if let Some(requests) = self.requests {
            documents.push((Collection::Requests, encode(Collection::Requests, &requests)?));
        }
        Ok(documents)
    }
}

/// Typed, timeout-bounded facade over a [`ViewStore`].
#[derive(Debug, Clone)]
pub struct Views {
    store: Arc<dyn ViewStore>,
    io_timeout: Duration,
}

impl Views {
    /// Wraps a store; every load and commit is bounded by `io_timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn ViewStore>, io_timeout: Duration) -> Self {
        Self { store, io_timeout }
    }

    /// Loads the pair registry, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the collection does not decode,
    /// or a transient error on I/O failure or timeout.
    pub async fn pairs(&self) -> Result<Vec<Pair>, StoreError> {
        self.load(Collection::Pairs).await
    }

    /// Loads the swap history in application order.
    ///
    /// # Errors
    ///
    /// See [`Views::pairs`].
    pub async fn swaps(&self) -> Result<Vec<Swap>, StoreError> {
        self.load(Collection::Swaps).await
    }

    /// Loads the request log in submission order.
    ///
    /// # Errors
    ///
    /// See [`Views::pairs`].
    pub async fn requests(&self) -> Result<Vec<AdRequest>, StoreError> {
        self.load(Collection::Requests).await
    }

    /// Commits a batch atomically. Empty batches are a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the batch could not be made durable.
    pub async fn commit(&self, batch: ViewBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let documents = batch.into_documents()?;
        tokio::time::timeout(self.io_timeout, self.store.commit(documents))
            .await
            .map_err(|_| StoreError::Timeout("commit".to_string()))?
    }

    async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let document = tokio::time::timeout(self.io_timeout, self.store.load(collection))
            .await
            .map_err(|_| StoreError::Timeout(format!("load {collection}")))??;
        match document {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                collection,
                reason: e.to_string(),
            }),
        }
    }
}

fn encode<T: Serialize>(collection: Collection, records: &[T]) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(records).map_err(|e| StoreError::Corrupt {
        collection,
        reason: format!("encode failed: {e}"),
    })
}
