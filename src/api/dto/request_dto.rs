//! Ad-slot request DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PageMeta;
use crate::domain::AdRequest;
use crate::service::Page;

/// One ad-slot request.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestDto {
    /// Pair the request targets.
    pub pair_key: String,
    /// Requesting wallet.
    pub user: String,
    /// Pair creator; empty until the pair is indexed.
    pub creator: String,
    /// Index into the pair's ad-slot tiers.
    pub request_index: u32,
    /// Proposed advertisement text.
    pub ad_text: String,
    /// `Pending`, `Accepted`, `Rejected` or `Refunded`.
    pub status: String,
    /// Submission slot.
    pub slot: u64,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl From<AdRequest> for RequestDto {
    fn from(request: AdRequest) -> Self {
        Self {
            pair_key: request.pair_key,
            user: request.user,
            creator: request.creator,
            request_index: request.request_index,
            ad_text: request.ad_text,
            status: request.status.to_string(),
            slot: request.position.slot,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Paginated list response for `GET /api/v1/requests`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequestListResponse {
    /// Requests on this page, oldest first.
    pub items: Vec<RequestDto>,
    /// Pagination metadata.
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl From<Page<AdRequest>> for RequestListResponse {
    fn from(page: Page<AdRequest>) -> Self {
        let meta = PageMeta {
            total_pages: page.total_pages,
            current_page: page.current_page,
        };
        Self {
            items: page.map(RequestDto::from).items,
            meta,
        }
    }
}
