//! Projection engine: applies ledger events to the view collections.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::error::{Outcome, ProjectionError, SkipReason};
use crate::domain::{
    AdRequest, BondingCurve, EventEnvelope, EventKind, EventPosition, LedgerEvent, Pair,
    PairAccount, PairCreated, RequestResolved, RequestStatus, RequestSubmitted, Swap,
    SwapExecuted, Transition,
};
use crate::source::{AccountReadError, AccountReader};
use crate::store::{StoreError, ViewBatch, Views};

/// Static settings of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Pricing curve.
    pub curve: BondingCurve,
    /// Symbol of the collateral leg in swap records (e.g. `"SOL"`).
    pub collateral_symbol: String,
    /// Upper bound on a single account read.
    pub io_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            curve: BondingCurve::default(),
            collateral_symbol: "SOL".to_string(),
            io_timeout: Duration::from_secs(5),
        }
    }
}

/// One mutex per collection.
///
/// Handlers take the locks they need in `pairs → swaps → requests`
/// order and hold them across the whole load-modify-commit cycle.
#[derive(Debug, Default)]
struct CollectionLocks {
    pairs: Mutex<()>,
    swaps: Mutex<()>,
    requests: Mutex<()>,
}

/// Turns ledger events into committed view mutations.
///
/// Cheap to clone; clones share the same locks, so concurrent
/// [`dispatch`](Self::dispatch) calls on any clone never lose updates.
#[derive(Debug, Clone)]
pub struct ProjectionEngine {
    views: Views,
    accounts: Arc<dyn AccountReader>,
    settings: EngineSettings,
    locks: Arc<CollectionLocks>,
}

impl ProjectionEngine {
    /// Creates an engine over the given views and account reader.
    #[must_use]
    pub fn new(views: Views, accounts: Arc<dyn AccountReader>, settings: EngineSettings) -> Self {
        Self {
            views,
            accounts,
            settings,
            locks: Arc::new(CollectionLocks::default()),
        }
    }

    /// Views this engine writes to.
    #[must_use]
    pub fn views(&self) -> &Views {
        &self.views
    }

    /// Pricing curve in use.
    #[must_use]
    pub fn curve(&self) -> &BondingCurve {
        &self.settings.curve
    }

    /// Decodes and applies one event.
    ///
    /// # Errors
    ///
    /// Returns a [`ProjectionError`]; its [`retry_class`]
    /// (ProjectionError::retry_class) tells the caller whether to retry.
    /// Nothing is committed when an error is returned.
    pub async fn dispatch(&self, envelope: &EventEnvelope) -> Result<Outcome, ProjectionError> {
        let event = envelope.decode()?;
        self.apply(&event, envelope.position(), event_time(envelope))
            .await
    }

    /// Applies an already decoded event.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn apply(
        &self,
        event: &LedgerEvent,
        position: EventPosition,
        at: DateTime<Utc>,
    ) -> Result<Outcome, ProjectionError> {
        match event {
            LedgerEvent::PairCreated(e) => self.apply_pair_created(e, position, at).await,
            LedgerEvent::SwapExecuted(e) => self.apply_swap_executed(e, position, at).await,
            LedgerEvent::RequestSubmitted(e) => {
                self.apply_request_submitted(e, position, at).await
            }
            LedgerEvent::RequestAccepted(e) => {
                self.apply_request_resolution(e, RequestStatus::Accepted, at)
                    .await
            }
            LedgerEvent::RequestRejected(e) => {
                self.apply_request_resolution(e, RequestStatus::Rejected, at)
                    .await
            }
            LedgerEvent::RequestRefunded(e) => {
                self.apply_request_resolution(e, RequestStatus::Refunded, at)
                    .await
            }
        }
    }

    /// Registers a new pair at the head of the registry.
    ///
    /// Requests submitted before the pair was indexed get their blank
    /// creator filled in by the same commit.
    ///
    /// # Errors
    ///
    /// [`ProjectionError::UnknownEntity`] if the account is not readable
    /// yet, [`ProjectionError::TransientIo`] on I/O failure.
    pub async fn apply_pair_created(
        &self,
        event: &PairCreated,
        position: EventPosition,
        at: DateTime<Utc>,
    ) -> Result<Outcome, ProjectionError> {
        // Skip the account read for redeliveries.
        if self.pair_exists(&event.pair_key).await? {
            tracing::debug!(pair_key = %event.pair_key, "pair already indexed");
            return Ok(Outcome::Duplicate);
        }

        let account = self.fetch_account(&event.pair_key).await?;

        let _pairs_guard = self.locks.pairs.lock().await;
        let mut pairs = self.views.pairs().await?;
        if pairs.iter().any(|p| p.pair_key == event.pair_key) {
            return Ok(Outcome::Duplicate);
        }
        let pair = Pair::from_creation(event, account, &self.settings.curve, position.slot, at);
        let creator = pair.creator.clone();
        pairs.insert(0, pair);

        let _requests_guard = self.locks.requests.lock().await;
        let mut batch = ViewBatch::new();
        match self.views.requests().await {
            Ok(mut requests) => {
                let mut backfilled = 0usize;
                for request in requests
                    .iter_mut()
                    .filter(|r| r.pair_key == event.pair_key && r.creator.is_empty())
                {
                    request.creator.clone_from(&creator);
                    backfilled += 1;
                }
                if backfilled > 0 {
                    tracing::info!(pair_key = %event.pair_key, backfilled, "backfilled request creators");
                    batch = batch.with_requests(requests);
                }
            }
            Err(StoreError::Corrupt { reason, .. }) => {
                tracing::error!(pair_key = %event.pair_key, %reason, "requests unreadable; skipping creator backfill");
            }
            Err(e) => return Err(e.into()),
        }

        self.views.commit(batch.with_pairs(pairs)).await?;
        tracing::info!(pair_id = event.pair_id, pair_key = %event.pair_key, slot = position.slot, "indexed new pair");
        Ok(Outcome::Applied)
    }

    /// Applies a buy or sell to its pair and appends the swap record.
    ///
    /// # Errors
    ///
    /// [`ProjectionError::UnknownEntity`] if the pair is not indexed yet,
    /// [`ProjectionError::OutOfOrder`] if a newer swap was already applied.
    pub async fn apply_swap_executed(
        &self,
        event: &SwapExecuted,
        position: EventPosition,
        at: DateTime<Utc>,
    ) -> Result<Outcome, ProjectionError> {
        let _pairs_guard = self.locks.pairs.lock().await;
        let _swaps_guard = self.locks.swaps.lock().await;

        let mut pairs = self.views.pairs().await?;
        let mut swaps = self.views.swaps().await?;

        let Some(pair) = pairs.iter_mut().find(|p| p.pair_key == event.pair_key) else {
            return Err(ProjectionError::UnknownEntity {
                kind: EventKind::SwapExecuted,
                key: event.pair_key.clone(),
            });
        };

        if let Some(last) = pair.last_position
            && position <= last
        {
            if swaps.iter().any(|s| s.records(event, position)) {
                tracing::debug!(pair_key = %event.pair_key, %position, "swap already applied");
                return Ok(Outcome::Duplicate);
            }
            if position < last {
                return Err(ProjectionError::OutOfOrder {
                    pair_key: event.pair_key.clone(),
                    position,
                    last,
                });
            }
            tracing::debug!(pair_key = %event.pair_key, %position, "another swap at the last applied position");
        }

        let effect = pair.apply_swap(event, &self.settings.curve, position, at);
        if !self.settings.curve.in_range(effect.supply_after) {
            tracing::warn!(
                pair_key = %event.pair_key,
                supply = %effect.supply_after,
                "supply left the curve range"
            );
        }
        let ticker = if pair.ticker.is_empty() {
            event.attention_token.as_str()
        } else {
            pair.ticker.as_str()
        };
        let record = Swap::record(
            event,
            effect,
            &self.settings.collateral_symbol,
            ticker,
            position,
            at,
        );
        swaps.push(record);

        self.views
            .commit(ViewBatch::new().with_pairs(pairs).with_swaps(swaps))
            .await?;
        tracing::info!(
            pair_key = %event.pair_key,
            is_buy = event.is_buy,
            start_price = effect.start_price,
            end_price = effect.end_price,
            %position,
            "applied swap"
        );
        Ok(Outcome::Applied)
    }

    /// Appends a pending ad-slot request.
    ///
    /// The creator is copied from the pair when it is indexed and left
    /// blank otherwise; [`apply_pair_created`](Self::apply_pair_created)
    /// fills it in later.
    ///
    /// # Errors
    ///
    /// [`ProjectionError::TransientIo`] on I/O failure,
    /// [`ProjectionError::StorageCorruption`] if requests do not decode.
    pub async fn apply_request_submitted(
        &self,
        event: &RequestSubmitted,
        position: EventPosition,
        at: DateTime<Utc>,
    ) -> Result<Outcome, ProjectionError> {
        let _pairs_guard = self.locks.pairs.lock().await;
        let _requests_guard = self.locks.requests.lock().await;

        let creator = match self.views.pairs().await {
            Ok(pairs) => pairs
                .into_iter()
                .find(|p| p.pair_key == event.pair_key)
                .map(|p| p.creator)
                .unwrap_or_default(),
            Err(StoreError::Corrupt { reason, .. }) => {
                tracing::error!(pair_key = %event.pair_key, %reason, "pairs unreadable; creator left blank");
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut requests = self.views.requests().await?;
        if requests.iter().any(|r| r.submitted_by(event, position)) {
            tracing::debug!(pair_key = %event.pair_key, %position, "request already recorded");
            return Ok(Outcome::Duplicate);
        }
        if creator.is_empty() {
            tracing::info!(pair_key = %event.pair_key, "pair not indexed yet; creator pending backfill");
        }

        requests.push(AdRequest::submitted(event, creator, position, at));
        self.views
            .commit(ViewBatch::new().with_requests(requests))
            .await?;
        tracing::info!(
            pair_key = %event.pair_key,
            user = %event.user,
            request_index = event.request_index,
            "recorded ad request"
        );
        Ok(Outcome::Applied)
    }

    /// Moves the first matching pending request to `target`.
    ///
    /// Missing and already-terminal requests are skipped, not errors.
    ///
    /// # Errors
    ///
    /// [`ProjectionError::TransientIo`] on I/O failure,
    /// [`ProjectionError::StorageCorruption`] if requests do not decode.
    pub async fn apply_request_resolution(
        &self,
        event: &RequestResolved,
        target: RequestStatus,
        at: DateTime<Utc>,
    ) -> Result<Outcome, ProjectionError> {
        let _requests_guard = self.locks.requests.lock().await;

        let mut requests = self.views.requests().await?;
        let Some(request) = requests.iter_mut().find(|r| r.matches(event)) else {
            tracing::info!(
                user = %event.user,
                request_index = event.request_index,
                %target,
                "no matching request; ignoring resolution"
            );
            return Ok(Outcome::Skipped(SkipReason::RequestNotFound));
        };

        let stamp = resolution_time(event).unwrap_or(at);
        match request.transition(target, stamp) {
            Transition::AlreadyTerminal(status) => {
                tracing::info!(
                    pair_key = %request.pair_key,
                    user = %event.user,
                    %status,
                    %target,
                    "request already resolved"
                );
                Ok(Outcome::Skipped(SkipReason::AlreadyTerminal(status)))
            }
            Transition::Applied => {
                let pair_key = request.pair_key.clone();
                self.views
                    .commit(ViewBatch::new().with_requests(requests))
                    .await?;
                tracing::info!(%pair_key, user = %event.user, %target, "request resolved");
                Ok(Outcome::Applied)
            }
        }
    }

    async fn pair_exists(&self, pair_key: &str) -> Result<bool, ProjectionError> {
        let pairs = self.views.pairs().await?;
        Ok(pairs.iter().any(|p| p.pair_key == pair_key))
    }

    async fn fetch_account(&self, pair_key: &str) -> Result<PairAccount, ProjectionError> {
        let read = self.accounts.fetch_pair_account(pair_key);
        match tokio::time::timeout(self.settings.io_timeout, read).await {
            Err(_) => Err(ProjectionError::TransientIo(format!(
                "account read for {pair_key} timed out"
            ))),
            Ok(Ok(account)) => Ok(account),
            Ok(Err(AccountReadError::Transient(reason))) => Err(ProjectionError::TransientIo(reason)),
            Ok(Err(AccountReadError::NotFound(_))) => Err(ProjectionError::UnknownEntity {
                kind: EventKind::PairCreated,
                key: pair_key.to_string(),
            }),
            Ok(Err(AccountReadError::Malformed(reason))) => {
                Err(ProjectionError::MalformedPayload(reason))
            }
        }
    }
}

/// Block time of the envelope, or now when the source did not supply one.
fn event_time(envelope: &EventEnvelope) -> DateTime<Utc> {
    envelope
        .block_time
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

fn resolution_time(event: &RequestResolved) -> Option<DateTime<Utc>> {
    (event.timestamp > 0)
        .then(|| DateTime::from_timestamp(event.timestamp, 0))
        .flatten()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::RequestConfig;
    use crate::projection::RetryClass;
    use crate::source::StaticAccountReader;
    use crate::store::{Collection, InMemoryViewStore};
    use serde_json::json;

    struct Harness {
        engine: ProjectionEngine,
        store: Arc<InMemoryViewStore>,
        accounts: Arc<StaticAccountReader>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryViewStore::new());
        let accounts = Arc::new(StaticAccountReader::new());
        accounts.insert("pair-1", account("ATT"));
        accounts.insert("pair-2", account("BTT"));
        let shared_store = Arc::clone(&store);
        let shared_accounts = Arc::clone(&accounts);
        let views = Views::new(shared_store, Duration::from_secs(1));
        let engine = ProjectionEngine::new(views, shared_accounts, EngineSettings::default());
        Harness {
            engine,
            store,
            accounts,
        }
    }

    fn account(ticker: &str) -> PairAccount {
        PairAccount {
            creator: "creator-1".to_string(),
            attention_token: format!("mint-{ticker}"),
            name: format!("{ticker} market"),
            ticker: ticker.to_string(),
            request_configs: vec![RequestConfig {
                price: 1_000_000,
                description: "pinned post".to_string(),
            }],
            ..PairAccount::default()
        }
    }

    fn pair_created(pair_key: &str, slot: u64) -> EventEnvelope {
        EventEnvelope::new(
            EventKind::PairCreated,
            json!({"pairId": slot, "pairKey": pair_key, "creator": "creator-1", "basePrice": 40000}),
            slot,
            0,
        )
    }

    fn swap(pair_key: &str, is_buy: bool, amount_in: u64, amount_out: u64, slot: u64) -> EventEnvelope {
        EventEnvelope::new(
            EventKind::SwapExecuted,
            json!({
                "isBuy": is_buy,
                "amountIn": amount_in,
                "amountOut": amount_out,
                "user": "trader",
                "pairKey": pair_key,
                "attentionToken": "mint"
            }),
            slot,
            0,
        )
    }

    fn submitted(pair_key: &str, user: &str, index: u32, slot: u64) -> EventEnvelope {
        EventEnvelope::new(
            EventKind::RequestSubmitted,
            json!({"pairKey": pair_key, "user": user, "requestIndex": index, "adText": "gm"}),
            slot,
            0,
        )
    }

    fn accepted(user: &str, index: u32, slot: u64) -> EventEnvelope {
        EventEnvelope::new(
            EventKind::RequestAccepted,
            json!({"creator": "creator-1", "requestIndex": index, "user": user, "timestamp": 1_700_000_000}),
            slot,
            0,
        )
    }

    async fn dispatch_ok(engine: &ProjectionEngine, envelope: &EventEnvelope) -> Outcome {
        match engine.dispatch(envelope).await {
            Ok(outcome) => outcome,
            Err(e) => panic!("dispatch failed: {e}"),
        }
    }

    async fn only_pair(engine: &ProjectionEngine) -> Pair {
        let Ok(mut pairs) = engine.views().pairs().await else {
            panic!("load pairs");
        };
        assert_eq!(pairs.len(), 1);
        let Some(pair) = pairs.pop() else {
            panic!("no pair");
        };
        pair
    }

    #[tokio::test]
    async fn pair_creation_uses_account_metadata() {
        let h = harness();
        assert_eq!(dispatch_ok(&h.engine, &pair_created("pair-1", 10)).await, Outcome::Applied);

        let pair = only_pair(&h.engine).await;
        assert_eq!(pair.ticker, "ATT");
        assert_eq!(pair.attention_token, "mint-ATT");
        assert_eq!(pair.request_configs.len(), 1);
        assert_eq!(pair.created_slot, 10);
        assert_eq!(pair.price, 40_000.0);
    }

    #[tokio::test]
    async fn new_pairs_are_prepended() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &pair_created("pair-2", 2)).await;
        let Ok(pairs) = h.engine.views().pairs().await else {
            panic!("load pairs");
        };
        let keys: Vec<&str> = pairs.iter().map(|p| p.pair_key.as_str()).collect();
        assert_eq!(keys, ["pair-2", "pair-1"]);
    }

    #[tokio::test]
    async fn redelivered_creation_keeps_accumulators() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &swap("pair-1", true, 1_000, 500_000, 2)).await;

        assert_eq!(dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await, Outcome::Duplicate);
        let pair = only_pair(&h.engine).await;
        assert_eq!(pair.supply, 500_000);
        assert_eq!(pair.buys, 1);
    }

    #[tokio::test]
    async fn missing_account_is_unknown_entity() {
        let h = harness();
        let result = h.engine.dispatch(&pair_created("pair-9", 1)).await;
        assert!(matches!(
            result,
            Err(ProjectionError::UnknownEntity { kind: EventKind::PairCreated, .. })
        ));
    }

    #[tokio::test]
    async fn first_buy_matches_reference_scenario() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &swap("pair-1", true, 1_000, 500_000, 2)).await;

        let Ok(swaps) = h.engine.views().swaps().await else {
            panic!("load swaps");
        };
        let Some(record) = swaps.first() else {
            panic!("no swap recorded");
        };
        assert_eq!(record.start_price, 40_000.0);
        assert!((record.end_price - 40_000.004_998).abs() < 1e-6);
        assert_eq!(record.token_in, "SOL");
        assert_eq!(record.token_out, "ATT");
        assert_eq!(record.average_price, 0.002);

        let pair = only_pair(&h.engine).await;
        assert_eq!(pair.supply, 500_000);
        assert_eq!(pair.liquidity, 1_000);
        assert_eq!(pair.volume, 1_000);
        assert_eq!(pair.price, record.end_price);
    }

    #[tokio::test]
    async fn swap_before_pair_is_unknown_entity() {
        let h = harness();
        let result = h.engine.dispatch(&swap("pair-1", true, 1, 1, 2)).await;
        assert!(matches!(
            result,
            Err(ProjectionError::UnknownEntity { kind: EventKind::SwapExecuted, .. })
        ));
        let Ok(swaps) = h.engine.views().swaps().await else {
            panic!("load swaps");
        };
        assert!(swaps.is_empty());
    }

    #[tokio::test]
    async fn redelivered_swap_is_duplicate() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        let buy = swap("pair-1", true, 1_000, 500_000, 2);
        dispatch_ok(&h.engine, &buy).await;
        assert_eq!(dispatch_ok(&h.engine, &buy).await, Outcome::Duplicate);

        let pair = only_pair(&h.engine).await;
        assert_eq!(pair.supply, 500_000);
        assert_eq!(pair.buys, 1);
    }

    #[tokio::test]
    async fn distinct_swaps_sharing_a_slot_both_apply() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        let first = swap("pair-1", true, 10, 100, 10);
        let second = swap("pair-1", true, 30, 300, 10);

        assert_eq!(dispatch_ok(&h.engine, &first).await, Outcome::Applied);
        assert_eq!(dispatch_ok(&h.engine, &second).await, Outcome::Applied);
        assert_eq!(dispatch_ok(&h.engine, &first).await, Outcome::Duplicate);

        let pair = only_pair(&h.engine).await;
        assert_eq!(pair.supply, 400);
        assert_eq!(pair.buys, 2);
    }

    #[tokio::test]
    async fn late_swap_is_rejected_as_out_of_order() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &swap("pair-1", true, 1_000, 500_000, 5)).await;

        let result = h.engine.dispatch(&swap("pair-1", false, 100_000, 10, 4)).await;
        assert!(matches!(result, Err(ProjectionError::OutOfOrder { .. })));
        let pair = only_pair(&h.engine).await;
        assert_eq!(pair.supply, 500_000);
    }

    #[tokio::test]
    async fn failed_commit_leaves_pair_and_swaps_untouched() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        h.store.fail_next_commits(1);

        let result = h.engine.dispatch(&swap("pair-1", true, 1_000, 500_000, 2)).await;
        assert!(matches!(result, Err(ProjectionError::TransientIo(_))));

        let pair = only_pair(&h.engine).await;
        assert_eq!(pair.supply, 0);
        let Ok(swaps) = h.engine.views().swaps().await else {
            panic!("load swaps");
        };
        assert!(swaps.is_empty());

        // The retry applies exactly once.
        dispatch_ok(&h.engine, &swap("pair-1", true, 1_000, 500_000, 2)).await;
        assert_eq!(only_pair(&h.engine).await.supply, 500_000);
    }

    #[tokio::test]
    async fn concurrent_swaps_on_one_pair_lose_nothing() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;

        let mut handles = Vec::new();
        for i in 0..16u64 {
            let engine = h.engine.clone();
            handles.push(tokio::spawn(async move {
                let mut envelope = swap("pair-1", true, 10, 100, 100);
                envelope.index = u32::try_from(i).unwrap_or(u32::MAX);
                engine.dispatch(&envelope).await
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if let Ok(Ok(Outcome::Applied)) = handle.await {
                applied += 1;
            }
        }

        // Arrival order is arbitrary, so some may be rejected as late;
        // whatever was applied is fully reflected in both collections.
        let pair = only_pair(&h.engine).await;
        let Ok(swaps) = h.engine.views().swaps().await else {
            panic!("load swaps");
        };
        assert_eq!(swaps.len(), applied);
        assert_eq!(pair.supply, 100 * i128::try_from(applied).unwrap_or(0));
        assert_eq!(pair.buys, u64::try_from(applied).unwrap_or(0));
    }

    #[tokio::test]
    async fn concurrent_swaps_on_different_pairs_all_apply() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &pair_created("pair-2", 2)).await;

        let a = h.engine.clone();
        let b = h.engine.clone();
        let (ra, rb) = tokio::join!(
            async move { a.dispatch(&swap("pair-1", true, 5, 50, 3)).await },
            async move { b.dispatch(&swap("pair-2", true, 7, 70, 3)).await },
        );
        assert_eq!(ra, Ok(Outcome::Applied));
        assert_eq!(rb, Ok(Outcome::Applied));

        let Ok(pairs) = h.engine.views().pairs().await else {
            panic!("load pairs");
        };
        let supplies: Vec<i128> = pairs.iter().map(|p| p.supply).collect();
        assert_eq!(supplies, [70, 50]);
    }

    #[tokio::test]
    async fn request_copies_creator_from_pair() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &submitted("pair-1", "user-1", 0, 2)).await;

        let Ok(requests) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        let Some(request) = requests.first() else {
            panic!("no request");
        };
        assert_eq!(request.creator, "creator-1");
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn request_before_pair_is_backfilled_on_creation() {
        let h = harness();
        dispatch_ok(&h.engine, &submitted("pair-1", "user-1", 0, 1)).await;
        let Ok(requests) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        assert_eq!(requests.first().map(|r| r.creator.as_str()), Some(""));

        dispatch_ok(&h.engine, &pair_created("pair-1", 2)).await;
        let Ok(requests) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        assert_eq!(requests.first().map(|r| r.creator.as_str()), Some("creator-1"));
    }

    #[tokio::test]
    async fn redelivered_submission_is_duplicate() {
        let h = harness();
        let event = submitted("pair-1", "user-1", 0, 3);
        dispatch_ok(&h.engine, &event).await;
        assert_eq!(dispatch_ok(&h.engine, &event).await, Outcome::Duplicate);
        let Ok(requests) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn submissions_on_two_pairs_in_one_slot_are_both_recorded() {
        let h = harness();
        let on_first = submitted("pair-1", "user-1", 0, 11);
        let on_second = submitted("pair-2", "user-1", 0, 11);
        assert_eq!(dispatch_ok(&h.engine, &on_first).await, Outcome::Applied);
        assert_eq!(dispatch_ok(&h.engine, &on_second).await, Outcome::Applied);

        let Ok(requests) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        let mut pairs: Vec<&str> = requests.iter().map(|r| r.pair_key.as_str()).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, ["pair-1", "pair-2"]);
    }

    #[tokio::test]
    async fn acceptance_is_idempotent() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &submitted("pair-1", "user-1", 0, 2)).await;

        assert_eq!(dispatch_ok(&h.engine, &accepted("user-1", 0, 3)).await, Outcome::Applied);
        let Ok(after_first) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        let commits = h.store.commit_count();

        assert_eq!(
            dispatch_ok(&h.engine, &accepted("user-1", 0, 3)).await,
            Outcome::Skipped(SkipReason::AlreadyTerminal(RequestStatus::Accepted))
        );
        let Ok(after_second) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        assert_eq!(after_first, after_second);
        assert_eq!(h.store.commit_count(), commits);

        let Some(request) = after_second.first() else {
            panic!("no request");
        };
        assert_eq!(request.status, RequestStatus::Accepted);
        assert_eq!(request.updated_at.timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn acceptance_of_unknown_request_is_noop() {
        let h = harness();
        assert_eq!(
            dispatch_ok(&h.engine, &accepted("nobody", 4, 1)).await,
            Outcome::Skipped(SkipReason::RequestNotFound)
        );
        assert_eq!(h.store.commit_count(), 0);
    }

    #[tokio::test]
    async fn pair_key_disambiguates_same_index_on_two_pairs() {
        let h = harness();
        dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await;
        dispatch_ok(&h.engine, &pair_created("pair-2", 2)).await;
        dispatch_ok(&h.engine, &submitted("pair-1", "user-1", 0, 3)).await;
        dispatch_ok(&h.engine, &submitted("pair-2", "user-1", 0, 4)).await;

        let refund = EventEnvelope::new(
            EventKind::RequestRefunded,
            json!({"requestIndex": 0, "user": "user-1", "pairKey": "pair-2"}),
            5,
            0,
        );
        assert_eq!(dispatch_ok(&h.engine, &refund).await, Outcome::Applied);

        let Ok(requests) = h.engine.views().requests().await else {
            panic!("load requests");
        };
        let statuses: Vec<(&str, RequestStatus)> = requests
            .iter()
            .map(|r| (r.pair_key.as_str(), r.status))
            .collect();
        assert_eq!(
            statuses,
            [("pair-1", RequestStatus::Pending), ("pair-2", RequestStatus::Refunded)]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_not_retryable() {
        let h = harness();
        let bad = EventEnvelope::new(EventKind::SwapExecuted, json!({"isBuy": 1}), 1, 0);
        let Err(err) = h.engine.dispatch(&bad).await else {
            panic!("expected failure");
        };
        assert_eq!(err.retry_class(), RetryClass::Never);
    }

    #[tokio::test]
    async fn corrupt_requests_do_not_block_pairs_and_swaps() {
        let h = harness();
        h.store.put_raw(Collection::Requests, json!("garbage"));

        assert_eq!(dispatch_ok(&h.engine, &pair_created("pair-1", 1)).await, Outcome::Applied);
        assert_eq!(
            dispatch_ok(&h.engine, &swap("pair-1", true, 1, 10, 2)).await,
            Outcome::Applied
        );
        let result = h.engine.dispatch(&submitted("pair-1", "u", 0, 3)).await;
        assert!(matches!(
            result,
            Err(ProjectionError::StorageCorruption { collection: Collection::Requests, .. })
        ));
    }

    #[tokio::test]
    async fn account_registered_later_lets_creation_succeed() {
        let h = harness();
        assert!(h.engine.dispatch(&pair_created("pair-3", 1)).await.is_err());
        h.accounts.insert("pair-3", account("CTT"));
        assert_eq!(dispatch_ok(&h.engine, &pair_created("pair-3", 1)).await, Outcome::Applied);
    }
}
