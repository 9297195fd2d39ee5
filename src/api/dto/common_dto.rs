//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::service::{DEFAULT_LIMIT, PageRequest};

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (1–100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Pagination plus an optional pair filter.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PairFilterParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (1–100). Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Only return records of this pair.
    #[serde(default)]
    pub pair_key: Option<String>,
}

/// Pagination metadata flattened into list responses.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Total number of pages; 0 when there are no items.
    pub total_pages: u32,
    /// Page that was returned.
    pub current_page: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl PaginationParams {
    /// Clamps into a [`PageRequest`].
    #[must_use]
    pub fn clamped(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

impl PairFilterParams {
    /// Clamps into a [`PageRequest`].
    #[must_use]
    pub fn clamped(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }

    /// The pair filter, ignoring blank values.
    #[must_use]
    pub fn pair_key(&self) -> Option<&str> {
        self.pair_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}
