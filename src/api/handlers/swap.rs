//! Swap history handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PairFilterParams, SwapListResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, IndexerError};

/// `GET /swaps` — Swap history, optionally for one pair.
///
/// # Errors
///
/// Returns [`IndexerError::Storage`] if the view store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/swaps",
    tag = "Swaps",
    summary = "List swaps",
    description = "Returns a page of executed swaps in the order they were applied, optionally filtered by `pairKey`.",
    params(PairFilterParams),
    responses(
        (status = 200, description = "Paginated swap list", body = SwapListResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn list_swaps(
    State(state): State<AppState>,
    Query(params): Query<PairFilterParams>,
) -> Result<impl IntoResponse, IndexerError> {
    let page = state
        .query_service
        .list_swaps(params.clamped(), params.pair_key())
        .await?;
    Ok(Json(SwapListResponse::from(page)))
}

/// Swap routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/swaps", get(list_swaps))
}
