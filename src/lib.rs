//! # flake-indexer
//!
//! Event-projection indexer and read API for a bonding-curve attention
//! exchange.
//!
//! Ledger events (pair creation, swaps, ad-slot requests and their
//! resolutions) are projected into three persisted views, and a REST API
//! serves paginated slices of them. Prices come from a linear bonding
//! curve; every swap is committed together with its pair update.
//!
//! ## Architecture
//!
//! ```text
//! Event source (HTTP intake, JSONL replay)
//!     │
//!     ├── Projector (pipeline/): reorder → dispatch → retry / dead-letter
//!     │
//!     ├── ProjectionEngine (projection/) ── AccountReader (source/)
//!     │         │
//!     │         └── BondingCurve (domain/)
//!     │
//!     ├── ViewStore (store/): file, PostgreSQL, in-memory
//!     │
//!     ├── QueryService (service/)
//!     │
//!     └── REST handlers (api/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod projection;
pub mod service;
pub mod source;
pub mod store;
