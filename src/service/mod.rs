//! Service layer: read-side orchestration.
//!
//! [`QueryService`] serves paginated, filtered slices of the view
//! collections maintained by the projection engine.

pub mod query_service;

pub use query_service::{DEFAULT_LIMIT, MAX_LIMIT, Page, PageRequest, QueryService};
