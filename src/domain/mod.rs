//! Domain layer: view records, ledger events, and the bonding curve.
//!
//! Everything here is pure data and pure functions. Persistence and
//! orchestration live in [`crate::store`] and [`crate::projection`].

pub mod bonding_curve;
pub mod event;
pub mod pair;
pub mod request;
pub mod swap;

pub use bonding_curve::BondingCurve;
pub use event::{
    DecodeError, EventEnvelope, EventKind, EventPosition, LedgerEvent, PairCreated,
    RequestResolved, RequestSubmitted, SwapExecuted,
};
pub use pair::{Pair, PairAccount, RequestConfig, SwapEffect};
pub use request::{AdRequest, RequestStatus, Transition};
pub use swap::Swap;
