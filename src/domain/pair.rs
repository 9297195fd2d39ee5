//! Pair view record: one bonding-curve market.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bonding_curve::BondingCurve;
use super::event::{EventPosition, PairCreated, SwapExecuted};

/// One configured ad-slot tier of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Price of the slot in collateral base units.
    pub price: u64,
    /// Creator-supplied description of the slot.
    pub description: String,
}

/// On-chain pair account fields read at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairAccount {
    /// Creator wallet.
    pub creator: String,
    /// Attention token mint.
    pub attention_token: String,
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub ticker: String,
    /// Free-form description.
    pub description: String,
    /// Token image URL.
    pub token_image: String,
    /// Twitter handle or URL.
    pub twitter: String,
    /// Telegram URL.
    pub telegram: String,
    /// Website URL.
    pub website: String,
    /// Ordered ad-slot tiers.
    pub request_configs: Vec<RequestConfig>,
}

/// Materialised state of one pair.
///
/// Identity and metadata are fixed at creation. The accumulators are
/// mutated only through [`Pair::apply_swap`], which also recomputes
/// `price` and `market_cap` so they never drift from `supply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    /// Factory creation sequence number.
    pub pair_id: u64,
    /// Pair account address.
    pub pair_key: String,
    /// Creator wallet.
    pub creator: String,
    /// Attention token mint.
    pub attention_token: String,
    /// Base price configured at creation.
    pub base_price: u64,
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub ticker: String,
    /// Free-form description.
    pub description: String,
    /// Token image URL.
    pub token_image: String,
    /// Twitter handle or URL.
    pub twitter: String,
    /// Telegram URL.
    pub telegram: String,
    /// Website URL.
    pub website: String,
    /// Ordered ad-slot tiers.
    pub request_configs: Vec<RequestConfig>,
    /// Net circulating units: bought out minus sold in.
    pub supply: i128,
    /// Net collateral held by the pair.
    pub liquidity: i128,
    /// Gross collateral traded.
    pub volume: u128,
    /// Number of buys applied.
    pub buys: u64,
    /// Number of sells applied.
    pub sells: u64,
    /// Spot price at the current supply.
    pub price: f64,
    /// Market capitalisation at the current price.
    pub market_cap: f64,
    /// Position of the last applied swap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_position: Option<EventPosition>,
    /// Slot of the creation event.
    pub created_slot: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

/// Before/after snapshot produced by one swap application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapEffect {
    /// Supply before the swap.
    pub supply_before: i128,
    /// Supply after the swap.
    pub supply_after: i128,
    /// Curve price at `supply_before`.
    pub start_price: f64,
    /// Curve price at `supply_after`.
    pub end_price: f64,
}

impl Pair {
    /// Builds a fresh pair from its creation event and account data.
    ///
    /// All accumulators start at zero and `price` is the curve floor.
    /// The event's `creator` wins over the account's if both are set.
    #[must_use]
    pub fn from_creation(
        event: &PairCreated,
        account: PairAccount,
        curve: &BondingCurve,
        slot: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let creator = if event.creator.is_empty() {
            account.creator
        } else {
            event.creator.clone()
        };
        let price = curve.price(0);
        Self {
            pair_id: event.pair_id,
            pair_key: event.pair_key.clone(),
            creator,
            attention_token: account.attention_token,
            base_price: event.base_price,
            name: account.name,
            ticker: account.ticker,
            description: account.description,
            token_image: account.token_image,
            twitter: account.twitter,
            telegram: account.telegram,
            website: account.website,
            request_configs: account.request_configs,
            supply: 0,
            liquidity: 0,
            volume: 0,
            buys: 0,
            sells: 0,
            price,
            market_cap: curve.market_cap(price, 0),
            last_position: None,
            created_slot: slot,
            created_at,
            updated_at: created_at,
        }
    }

    /// Applies a swap to the accumulators and reprices the pair.
    ///
    /// Start and end prices come from the same supply values that are
    /// written back, so the returned effect always brackets the mutation.
    pub fn apply_swap(
        &mut self,
        swap: &SwapExecuted,
        curve: &BondingCurve,
        position: EventPosition,
        at: DateTime<Utc>,
    ) -> SwapEffect {
        let supply_before = self.supply;
        let start_price = curve.price(supply_before);

        let amount_in = i128::from(swap.amount_in);
        let amount_out = i128::from(swap.amount_out);
        if swap.is_buy {
            self.supply = self.supply.saturating_add(amount_out);
            self.liquidity = self.liquidity.saturating_add(amount_in);
            self.volume = self.volume.saturating_add(u128::from(swap.amount_in));
            self.buys = self.buys.saturating_add(1);
        } else {
            self.supply = self.supply.saturating_sub(amount_in);
            self.liquidity = self.liquidity.saturating_sub(amount_out);
            self.volume = self.volume.saturating_add(u128::from(swap.amount_out));
            self.sells = self.sells.saturating_add(1);
        }

        let end_price = curve.price(self.supply);
        self.price = end_price;
        self.market_cap = curve.market_cap(end_price, self.supply);
        self.last_position = Some(position);
        self.updated_at = at;

        SwapEffect {
            supply_before,
            supply_after: self.supply,
            start_price,
            end_price,
        }
    }
}
