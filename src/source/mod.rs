//! Event source adapters: account reads and event intake.
//!
//! The ledger subscription itself is external. This module defines the
//! account-read seam the projection engine depends on, plus the intake
//! adapters that feed [`EventEnvelope`](crate::domain::EventEnvelope)s
//! into the projector queue.

pub mod http_account;
pub mod replay;
pub mod static_account;

use std::fmt;

use crate::domain::PairAccount;

pub use http_account::HttpAccountReader;
pub use replay::replay_file;
pub use static_account::StaticAccountReader;

/// Account read failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountReadError {
    /// Network failure, timeout, or server-side error; retry later.
    #[error("transient account read failure: {0}")]
    Transient(String),

    /// The account does not exist (yet) at the reader's commitment level.
    #[error("account not found: {0}")]
    NotFound(String),

    /// The account exists but its data cannot be decoded.
    #[error("account data malformed: {0}")]
    Malformed(String),
}

/// Reads on-chain pair account state.
#[async_trait::async_trait]
pub trait AccountReader: Send + Sync + fmt::Debug {
    /// Fetches the account behind `pair_key`.
    ///
    /// # Errors
    ///
    /// Returns an [`AccountReadError`] classifying the failure.
    async fn fetch_pair_account(&self, pair_key: &str) -> Result<PairAccount, AccountReadError>;
}
