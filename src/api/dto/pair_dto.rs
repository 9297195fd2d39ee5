//! Pair DTOs for list and detail endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PageMeta;
use crate::domain::{Pair, RequestConfig};
use crate::service::Page;

/// One ad-slot tier.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfigDto {
    /// Slot price in collateral base units (decimal string).
    pub price: String,
    /// Slot description.
    pub description: String,
}

/// A pair as served by the read API.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PairDto {
    /// Factory creation sequence number.
    pub pair_id: u64,
    /// Pair account address.
    pub pair_key: String,
    /// Creator wallet.
    pub creator: String,
    /// Attention token mint.
    pub attention_token: String,
    /// Base price at creation (decimal string).
    pub base_price: String,
    /// Display name.
    pub name: String,
    /// Ticker symbol.
    pub ticker: String,
    /// Description.
    pub description: String,
    /// Token image URL.
    pub token_image: String,
    /// Twitter handle or URL.
    pub twitter: String,
    /// Telegram URL.
    pub telegram: String,
    /// Website URL.
    pub website: String,
    /// Ad-slot tiers.
    pub request_configs: Vec<RequestConfigDto>,
    /// Circulating supply (decimal string).
    pub supply: String,
    /// Net collateral (decimal string).
    pub liquidity: String,
    /// Gross collateral traded (decimal string).
    pub volume: String,
    /// Buys applied.
    pub buys: u64,
    /// Sells applied.
    pub sells: u64,
    /// Spot price.
    pub price: f64,
    /// Market capitalisation.
    pub market_cap: f64,
    /// Slot of the creation event.
    pub created_slot: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<RequestConfig> for RequestConfigDto {
    fn from(config: RequestConfig) -> Self {
        Self {
            price: config.price.to_string(),
            description: config.description,
        }
    }
}

impl From<Pair> for PairDto {
    fn from(pair: Pair) -> Self {
        Self {
            pair_id: pair.pair_id,
            pair_key: pair.pair_key,
            creator: pair.creator,
            attention_token: pair.attention_token,
            base_price: pair.base_price.to_string(),
            name: pair.name,
            ticker: pair.ticker,
            description: pair.description,
            token_image: pair.token_image,
            twitter: pair.twitter,
            telegram: pair.telegram,
            website: pair.website,
            request_configs: pair.request_configs.into_iter().map(Into::into).collect(),
            supply: pair.supply.to_string(),
            liquidity: pair.liquidity.to_string(),
            volume: pair.volume.to_string(),
            buys: pair.buys,
            sells: pair.sells,
            price: pair.price,
            market_cap: pair.market_cap,
            created_slot: pair.created_slot,
            created_at: pair.created_at,
            updated_at: pair.updated_at,
        }
    }
}

/// Paginated list response for `GET /api/v1/pairs`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PairListResponse {
    /// Pairs on this page, newest first.
    pub items: Vec<PairDto>,
    /// Pagination metadata.
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// Legacy list response for `GET /api/markets`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarketsResponse {
    /// Pairs on this page, newest first.
    pub pairs: Vec<PairDto>,
    /// Pagination metadata.
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl From<Page<Pair>> for PairListResponse {
    fn from(page: Page<Pair>) -> Self {
        let meta = PageMeta {
            total_pages: page.total_pages,
            current_page: page.current_page,
        };
        Self {
            items: page.map(PairDto::from).items,
            meta,
        }
    }
}

impl From<Page<Pair>> for MarketsResponse {
    fn from(page: Page<Pair>) -> Self {
        let PairListResponse { items, meta } = page.into();
        Self { pairs: items, meta }
    }
}
