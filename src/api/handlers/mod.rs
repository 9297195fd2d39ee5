//! REST endpoint handlers organized by resource.

pub mod event;
pub mod pair;
pub mod request;
pub mod swap;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(pair::routes())
        .merge(swap::routes())
        .merge(request::routes())
        .merge(event::routes())
}
