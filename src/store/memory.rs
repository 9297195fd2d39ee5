//! In-memory view store for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use super::{Collection, StoreError, ViewStore};

/// Process-local [`ViewStore`].
///
/// Batches are applied under a single write lock, so readers never see a
/// half-applied batch. Commit failures can be injected with
/// [`fail_next_commits`](Self::fail_next_commits) to exercise retry paths.
#[derive(Debug, Default)]
pub struct InMemoryViewStore {
    documents: RwLock<HashMap<Collection, serde_json::Value>>,
    pending_failures: AtomicUsize,
    commits: AtomicUsize,
}

impl InMemoryViewStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with a transient I/O error.
    pub fn fail_next_commits(&self, count: usize) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Overwrites a collection document without going through a commit.
    pub fn put_raw(&self, collection: Collection, document: serde_json::Value) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection, document);
    }
}

#[async_trait::async_trait]
impl ViewStore for InMemoryViewStore {
    async fn load(&self, collection: Collection) -> Result<Option<serde_json::Value>, StoreError> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(&collection).cloned())
    }

    async fn commit(&self, batch: Vec<(Collection, serde_json::Value)>) -> Result<(), StoreError> {
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Io("injected commit failure".to_string()));
        }

        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        for (collection, document) in batch {
            documents.insert(collection, document);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn batch_replaces_all_collections() {
        let store = InMemoryViewStore::new();
        let result = store
            .commit(vec![
                (Collection::Pairs, json!([1])),
                (Collection::Swaps, json!([2])),
            ])
            .await;
        assert!(result.is_ok());

        let Ok(Some(pairs)) = store.load(Collection::Pairs).await else {
            panic!("pairs missing");
        };
        assert_eq!(pairs, json!([1]));
        let Ok(requests) = store.load(Collection::Requests).await else {
            panic!("load failed");
        };
        assert!(requests.is_none());
    }

    #[tokio::test]
    async fn injected_failures_leave_previous_version() {
        let store = InMemoryViewStore::new();
        let _ = store.store(Collection::Pairs, json!(["old"])).await;
        store.fail_next_commits(2);

        assert!(store.store(Collection::Pairs, json!(["new"])).await.is_err());
        assert!(store.store(Collection::Pairs, json!(["new"])).await.is_err());
        let Ok(Some(pairs)) = store.load(Collection::Pairs).await else {
            panic!("pairs missing");
        };
        assert_eq!(pairs, json!(["old"]));

        assert!(store.store(Collection::Pairs, json!(["new"])).await.is_ok());
        assert_eq!(store.commit_count(), 2);
    }
}
