//! Event intake handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{IngestRequest, IngestResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, IndexerError};

/// `POST /events` — Queue ledger events for projection.
///
/// Envelopes are queued in body order and applied asynchronously.
///
/// # Errors
///
/// Returns [`IndexerError::InvalidRequest`] for an empty batch and
/// [`IndexerError::IngestClosed`] once the projector has stopped.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Ingest ledger events",
    description = "Accepts one event envelope or an array of them. Events are queued for the projector and applied asynchronously; failures end up in the dead-letter log.",
    request_body = IngestRequest,
    responses(
        (status = 202, description = "Events queued", body = IngestResponse),
        (status = 400, description = "Empty batch", body = ErrorResponse),
        (status = 503, description = "Projector not accepting events", body = ErrorResponse),
    )
)]
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(body): Json<IngestRequest>,
) -> Result<impl IntoResponse, IndexerError> {
    let envelopes = body.into_envelopes();
    if envelopes.is_empty() {
        return Err(IndexerError::InvalidRequest("empty event batch".to_string()));
    }

    let mut accepted = 0usize;
    for envelope in envelopes {
        tracing::debug!(kind = %envelope.kind, slot = envelope.slot, "event queued");
        state
            .ingest
            .send(envelope)
            .await
            .map_err(|_| IndexerError::IngestClosed)?;
        accepted += 1;
    }

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted })))
}

/// Event intake routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(ingest_events))
}
