//! Swap history DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PageMeta;
use crate::domain::Swap;
use crate::service::Page;

/// One executed trade.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapDto {
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
    /// Units paid in (decimal string).
    pub amount_in: String,
    /// Units paid out (decimal string).
    pub amount_out: String,
    /// Collateral per attention unit.
    pub average_price: f64,
    /// Price before the trade.
    pub start_price: f64,
    /// Price after the trade.
    pub end_price: f64,
    /// Supply before the trade (decimal string).
    pub supply_before: String,
    /// Supply after the trade (decimal string).
    pub supply_after: String,
    /// Ledger slot.
    pub slot: u64,
    /// Index within the slot.
    pub index: u32,
    /// Trade timestamp.
    pub timestamp: DateTime<Utc>,
}

impl From<Swap> for SwapDto {
    fn from(swap: Swap) -> Self {
        Self {
            pair_key: swap.pair_key,
            user: swap.user,
            is_buy: swap.is_buy,
            token_in: swap.token_in,
            token_out: swap.token_out,
            amount_in: swap.amount_in.to_string(),
            amount_out: swap.amount_out.to_string(),
            average_price: swap.average_price,
            start_price: swap.start_price,
            end_price: swap.end_price,
            supply_before: swap.supply_before.to_string(),
            supply_after: swap.supply_after.to_string(),
            slot: swap.slot,
            index: swap.position.index,
            timestamp: swap.timestamp,
        }
    }
}

/// Paginated list response for `GET /api/v1/swaps`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SwapListResponse {
    /// Swaps on this page, oldest first.
    pub items: Vec<SwapDto>,
    /// Pagination metadata.
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl From<Page<Swap>> for SwapListResponse {
    fn from(page: Page<Swap>) -> Self {
        let meta = PageMeta {
            total_pages: page.total_pages,
            current_page: page.current_page,
        };
        Self {
            items: page.map(SwapDto::from).items,
            meta,
        }
    }
}
