//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::EventEnvelope;
use crate::service::QueryService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Read side over the view collections.
    pub query_service: Arc<QueryService>,
    /// Intake queue of the projector.
    pub ingest: mpsc::Sender<EventEnvelope>,
}
