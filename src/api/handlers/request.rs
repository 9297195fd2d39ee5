//! Ad-slot request handler.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PairFilterParams, RequestListResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, IndexerError};

/// `GET /requests` — Ad-slot requests, optionally for one pair.
///
/// # Errors
///
/// Returns [`IndexerError::Storage`] if the view store cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/requests",
    tag = "Requests",
    summary = "List ad-slot requests",
    description = "Returns a page of ad-slot requests in submission order, optionally filtered by `pairKey`.",
    params(PairFilterParams),
    responses(
        (status = 200, description = "Paginated request list", body = RequestListResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse),
    )
)]
pub async fn list_requests(
    State(state): State<AppState>,
    Query(params): Query<PairFilterParams>,
) -> Result<impl IntoResponse, IndexerError> {
    let page = state
        .query_service
        .list_requests(params.clamped(), params.pair_key())
        .await?;
    Ok(Json(RequestListResponse::from(page)))
}

/// Request routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/requests", get(list_requests))
}
