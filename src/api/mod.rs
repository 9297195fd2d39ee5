//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Versioned endpoints are mounted under `/api/v1`; `/health` and the
//! legacy `/api/markets` listing sit at the root.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the read and intake API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "flake-indexer",
        description = "Read API over the pair, swap and ad-slot request views, plus event intake."
    ),
    paths(
        handlers::pair::list_pairs,
        handlers::pair::get_pair,
        handlers::pair::list_markets,
        handlers::swap::list_swaps,
        handlers::request::list_requests,
        handlers::event::ingest_events,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::PairDto,
        dto::RequestConfigDto,
        dto::PairListResponse,
        dto::MarketsResponse,
        dto::SwapDto,
        dto::SwapListResponse,
        dto::RequestDto,
        dto::RequestListResponse,
        dto::PageMeta,
        dto::EventEnvelopeDto,
        dto::IngestRequest,
        dto::IngestResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Pairs", description = "Bonding-curve pairs"),
        (name = "Swaps", description = "Executed trades"),
        (name = "Requests", description = "Ad-slot requests"),
        (name = "Events", description = "Ledger event intake"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::pair::legacy_routes())
        .merge(handlers::system::routes());
    with_docs(router)
}

/// Builds the served application: every route behind the request
/// timeout, tracing and CORS layers.
///
/// A request still running after `request_timeout` is answered with
/// `408 Request Timeout`.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    build_router()
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::EventEnvelope;
    use crate::domain::pair::tests::make_pair;
    use crate::service::QueryService;
    use crate::store::{Collection, InMemoryViewStore, ViewBatch, Views};

    struct Harness {
        router: Router,
        store: Arc<InMemoryViewStore>,
        events: mpsc::Receiver<EventEnvelope>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryViewStore::new());
        let shared_store = Arc::clone(&store);
        let views = Views::new(shared_store, Duration::from_secs(1));
        let (ingest, events) = mpsc::channel(16);
        let state = AppState {
            query_service: Arc::new(QueryService::new(views)),
            ingest,
        };
        Harness {
            router: build_router().with_state(state),
            store,
            events,
        }
    }

    async fn seed(store: &Arc<InMemoryViewStore>, keys: &[&str]) {
        let shared_store = Arc::clone(store);
        let views = Views::new(shared_store, Duration::from_secs(1));
        let pairs = keys.iter().map(|k| make_pair(k)).collect();
        assert!(views.commit(ViewBatch::new().with_pairs(pairs)).await.is_ok());
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let Ok(response) = router.clone().oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        let Ok(request) = Request::get(uri).body(Body::empty()) else {
            panic!("bad request");
        };
        request
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        let Ok(request) = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
        else {
            panic!("bad request");
        };
        request
    }

    #[tokio::test]
    async fn empty_store_lists_empty_page() {
        let h = harness();
        let (status, body) = call(&h.router, get("/api/v1/pairs?limit=20")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"items": [], "totalPages": 0, "currentPage": 1}));
    }

    #[tokio::test]
    async fn pairs_page_with_string_amounts() {
        let h = harness();
        seed(&h.store, &["pair-a", "pair-b", "pair-c"]).await;

        let (status, body) = call(&h.router, get("/api/v1/pairs?page=2&limit=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("totalPages"), Some(&json!(2)));
        assert_eq!(body.get("currentPage"), Some(&json!(2)));
        assert_eq!(body.pointer("/items/0/pairKey"), Some(&json!("pair-c")));
        assert_eq!(body.pointer("/items/0/supply"), Some(&json!("0")));
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let h = harness();
        seed(&h.store, &["pair-a", "pair-b"]).await;
        let (_, body) = call(&h.router, get("/api/v1/pairs?limit=0&page=0")).await;
        assert_eq!(body.get("totalPages"), Some(&json!(2)));
        assert_eq!(body.get("currentPage"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn legacy_markets_uses_pairs_key() {
        let h = harness();
        seed(&h.store, &["pair-a"]).await;
        let (status, body) = call(&h.router, get("/api/markets")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.pointer("/pairs/0/pairKey"), Some(&json!("pair-a")));
        assert!(body.get("items").is_none());
    }

    #[tokio::test]
    async fn unknown_pair_is_404() {
        let h = harness();
        let (status, body) = call(&h.router, get("/api/v1/pairs/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.pointer("/error/code"), Some(&json!(2001)));
    }

    #[tokio::test]
    async fn corrupt_swaps_list_as_empty() {
        let h = harness();
        h.store.put_raw(Collection::Swaps, json!({"broken": true}));
        let (status, body) = call(&h.router, get("/api/v1/swaps?pairKey=pair-a")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("items"), Some(&json!([])));
    }

    #[tokio::test]
    async fn events_are_queued_in_order() {
        let mut h = harness();
        let batch = json!([
            {"kind": "PairCreated", "payload": {}, "slot": 1},
            {"kind": "SwapExecuted", "payload": {}, "slot": 2, "index": 4},
        ]);
        let (status, body) = call(&h.router, post_json("/api/v1/events", &batch)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"accepted": 2}));

        let slots: Vec<(u64, u32)> = [h.events.recv().await, h.events.recv().await]
            .into_iter()
            .flatten()
            .map(|e| (e.slot, e.index))
            .collect();
        assert_eq!(slots, [(1, 0), (2, 4)]);
    }

    #[tokio::test]
    async fn single_envelope_is_accepted() {
        let h = harness();
        let one = json!({"kind": "RequestAccepted", "payload": {}, "slot": 9, "blockTime": 1_700_000_000});
        let (status, body) = call(&h.router, post_json("/api/v1/events", &one)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"accepted": 1}));
    }

    #[tokio::test]
    async fn closed_intake_is_503() {
        let h = harness();
        drop(h.events);
        let one = json!({"kind": "PairCreated", "payload": {}, "slot": 1});
        let (status, _) = call(&h.router, post_json("/api/v1/events", &one)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = call(&h.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status"), Some(&json!("degraded")));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let h = harness();
        let (status, _) = call(&h.router, post_json("/api/v1/events", &json!([]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stalled_request_times_out_with_408() {
        let store = Arc::new(InMemoryViewStore::new());
        let views = Views::new(store, Duration::from_secs(1));
        // Capacity one and never drained: the second intake waits forever.
        let (ingest, _events) = mpsc::channel(1);
        let state = AppState {
            query_service: Arc::new(QueryService::new(views)),
            ingest,
        };
        let app = build_app(state, Duration::from_millis(50));

        let one = json!({"kind": "PairCreated", "payload": {}, "slot": 1});
        let (status, _) = call(&app, post_json("/api/v1/events", &one)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, _) = call(&app, post_json("/api/v1/events", &one)).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

        let (status, _) = call(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
