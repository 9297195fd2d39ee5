//! Swap history record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{EventPosition, SwapExecuted};
use super::pair::SwapEffect;

/// One executed trade. Written once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
    /// Pair the trade executed against.
    pub pair_key: String,
    /// Trader wallet.
    pub user: String,
    /// `true` for a buy.
    pub is_buy: bool,
    /// Symbol paid in.
    pub token_in: String,
    /// Symbol paid out.
    pub token_out: String,
    /// Units paid in.
    pub amount_in: u64,
    /// Units paid out.
    pub amount_out: u64,
    /// Collateral per attention unit for this trade.
    pub average_price: f64,
    /// Pair price before the trade.
    pub start_price: f64,
    /// Pair price after the trade.
    pub end_price: f64,
    /// Pair supply before the trade.
    pub supply_before: i128,
    /// Pair supply after the trade.
    pub supply_after: i128,
    /// Ledger slot of the trade.
    pub slot: u64,
    /// Ledger position of the trade.
    pub position: EventPosition,
    /// Trade timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Swap {
    /// Builds the history record for a swap that was just applied.
    ///
    /// `collateral_symbol` and `ticker` name the two legs; a buy pays
    /// collateral in and receives the pair's ticker.
    #[must_use]
    pub fn record(
        event: &SwapExecuted,
        effect: SwapEffect,
        collateral_symbol: &str,
        ticker: &str,
        position: EventPosition,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let (token_in, token_out) = if event.is_buy {
            (collateral_symbol.to_string(), ticker.to_string())
        } else {
            (ticker.to_string(), collateral_symbol.to_string())
        };
        Self {
            pair_key: event.pair_key.clone(),
            user: event.user.clone(),
            is_buy: event.is_buy,
            token_in,
            token_out,
            amount_in: event.amount_in,
            amount_out: event.amount_out,
            average_price: average_price(event),
            start_price: effect.start_price,
            end_price: effect.end_price,
            supply_before: effect.supply_before,
            supply_after: effect.supply_after,
            slot: position.slot,
            position,
            timestamp,
        }
    }

    /// Returns `true` if this record was written for `event` at `position`.
    ///
    /// Sources may deliver several swaps under one position when they only
    /// report the slot, so the trade itself is compared too.
    #[must_use]
    pub fn records(&self, event: &SwapExecuted, position: EventPosition) -> bool {
        self.position == position
            && self.pair_key == event.pair_key
            && self.user == event.user
            && self.is_buy == event.is_buy
            && self.amount_in == event.amount_in
            && self.amount_out == event.amount_out
    }
}

/// Collateral paid per attention unit.
///
/// Buys divide collateral in by tokens out, sells divide collateral out
/// by tokens in. A zero divisor yields `0.0`.
#[allow(clippy::cast_precision_loss)]
fn average_price(event: &SwapExecuted) -> f64 {
    let (collateral, tokens) = if event.is_buy {
        (event.amount_in, event.amount_out)
    } else {
        (event.amount_out, event.amount_in)
    };
    if tokens == 0 {
        0.0
    } else {
        collateral as f64 / tokens as f64
    }
}
