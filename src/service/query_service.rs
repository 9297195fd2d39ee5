//! Query service: paginated reads over the view collections.

use serde::Serialize;

use crate::domain::{AdRequest, Pair, Swap};
use crate::error::IndexerError;
use crate::store::{StoreError, Views};

/// Largest page size a client may ask for.
pub const MAX_LIMIT: u32 = 100;

/// Page size when the client does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Items per page, `1..=100`.
    pub limit: u32,
}

impl PageRequest {
    /// Clamps raw values: `page >= 1`, `limit` in `1..=100`.
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_LIMIT)
    }
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// `ceil(total / limit)`; `0` for an empty collection.
    pub total_pages: u32,
    /// The requested page.
    pub current_page: u32,
}

impl<T> Page<T> {
    /// Slices `items[(page-1)*limit .. page*limit]` out of `all`.
    ///
    /// Out-of-range pages come back empty.
    #[must_use]
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = u32::try_from(all.len()).unwrap_or(u32::MAX);
        let total_pages = total.div_ceil(request.limit);
        let start = usize::try_from(
            u64::from(request.page.saturating_sub(1)).saturating_mul(u64::from(request.limit)),
        )
        .unwrap_or(usize::MAX);
        let limit = usize::try_from(request.limit).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(start).take(limit).collect();
        Self {
            items,
            total_pages,
            current_page: request.page,
        }
    }

    /// Converts every item, keeping the paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_pages: self.total_pages,
            current_page: self.current_page,
        }
    }
}

/// Read side of the indexer.
///
/// Stateless over [`Views`]: every call loads the full collection and
/// slices it. A collection that was never written or does not decode
/// reads as empty; only genuine I/O failures surface as errors.
#[derive(Debug, Clone)]
pub struct QueryService {
    views: Views,
}

impl QueryService {
    /// Creates a query service.
    #[must_use]
    pub const fn new(views: Views) -> Self {
        Self { views }
    }

    /// Pairs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Storage`] on I/O failure.
    pub async fn list_pairs(&self, request: PageRequest) -> Result<Page<Pair>, IndexerError> {
        let pairs = or_empty(self.views.pairs().await)?;
        Ok(Page::slice(pairs, request))
    }

    /// Swap history in application order, optionally for one pair.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Storage`] on I/O failure.
    pub async fn list_swaps(
        &self,
        request: PageRequest,
        pair_key: Option<&str>,
    ) -> Result<Page<Swap>, IndexerError> {
        let mut swaps = or_empty(self.views.swaps().await)?;
        if let Some(key) = pair_key {
            swaps.retain(|s| s.pair_key == key);
        }
        Ok(Page::slice(swaps, request))
    }

    /// Ad-slot requests in submission order, optionally for one pair.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Storage`] on I/O failure.
    pub async fn list_requests(
        &self,
        request: PageRequest,
        pair_key: Option<&str>,
    ) -> Result<Page<AdRequest>, IndexerError> {
        let mut requests = or_empty(self.views.requests().await)?;
        if let Some(key) = pair_key {
            requests.retain(|r| r.pair_key == key);
        }
        Ok(Page::slice(requests, request))
    }

    /// One pair by key.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::PairNotFound`] if it is not indexed, or
    /// [`IndexerError::Storage`] on I/O failure.
    pub async fn get_pair(&self, pair_key: &str) -> Result<Pair, IndexerError> {
        or_empty(self.views.pairs().await)?
            .into_iter()
            .find(|p| p.pair_key == pair_key)
            .ok_or_else(|| IndexerError::PairNotFound(pair_key.to_string()))
    }
}

fn or_empty<T>(loaded: Result<Vec<T>, StoreError>) -> Result<Vec<T>, IndexerError> {
    match loaded {
        Ok(items) => Ok(items),
        Err(StoreError::Corrupt { collection, reason }) => {
            tracing::warn!(%collection, %reason, "collection unreadable; serving empty result");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
