//! Pair handlers: list, detail, and the legacy markets listing.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{MarketsResponse, PairDto, PairListResponse, PaginationParams};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, IndexerError};

/// `GET /pairs` — List indexed pairs, newest first.
///
/// # Errors
///
/// Returns [`IndexerError::Storage`] if the view store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/pairs",
    tag = "Pairs",
    summary = "List pairs",
    description = "Returns a page of indexed pairs, most recently created first. An empty or unreadable registry yields an empty page.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated pair list", body = PairListResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn list_pairs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, IndexerError> {
    let page = state.query_service.list_pairs(params.clamped()).await?;
    Ok(Json(PairListResponse::from(page)))
}

/// `GET /pairs/{pair_key}` — One pair.
///
/// # Errors
///
/// Returns [`IndexerError::PairNotFound`] if the pair is not indexed.
#[utoipa::path(
    get,
    path = "/api/v1/pairs/{pair_key}",
    tag = "Pairs",
    summary = "Get pair details",
    description = "Returns the current state of one pair, including curve price, market cap and accumulators.",
    params(
        ("pair_key" = String, Path, description = "Pair account address"),
    ),
    responses(
        (status = 200, description = "Pair details", body = PairDto),
        (status = 404, description = "Pair not found", body = ErrorResponse),
    )
)]
pub async fn get_pair(
    State(state): State<AppState>,
    Path(pair_key): Path<String>,
) -> Result<impl IntoResponse, IndexerError> {
    let pair = state.query_service.get_pair(&pair_key).await?;
    Ok(Json(PairDto::from(pair)))
}

/// `GET /api/markets` — Legacy pair listing.
///
/// # Errors
///
/// Returns [`IndexerError::Storage`] if the view store cannot be read.
#[utoipa::path(
    get,
    path = "/api/markets",
    tag = "Pairs",
    summary = "List pairs (legacy)",
    description = "Same data as `GET /api/v1/pairs`, under the `pairs` key used by older clients.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated pair list", body = MarketsResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn list_markets(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, IndexerError> {
    let page = state.query_service.list_pairs(params.clamped()).await?;
    Ok(Json(MarketsResponse::from(page)))
}

/// Pair routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pairs", get(list_pairs))
        .route("/pairs/{pair_key}", get(get_pair))
}

/// Legacy routes mounted at the root.
pub fn legacy_routes() -> Router<AppState> {
    Router::new().route("/api/markets", get(list_markets))
}
