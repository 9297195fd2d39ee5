//! Data Transfer Objects for REST request/response serialization.
//!
//! Amounts and supplies are serialized as JSON strings to prevent
//! precision loss on 128-bit values.

pub mod common_dto;
pub mod event_dto;
pub mod pair_dto;
pub mod request_dto;
pub mod swap_dto;

pub use common_dto::*;
pub use event_dto::*;
pub use pair_dto::*;
pub use request_dto::*;
pub use swap_dto::*;
