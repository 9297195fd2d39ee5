//! Ad-slot request record and its status machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{EventPosition, RequestResolved, RequestSubmitted};

/// Lifecycle status of an ad-slot request.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting the creator's decision.
    Pending,
    /// Accepted by the creator.
    Accepted,
    /// Rejected by the creator.
    Rejected,
    /// Refunded to the requester.
    Refunded,
}

impl RequestStatus {
    /// Returns `true` for `Accepted`, `Rejected` and `Refunded`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
            Self::Refunded => "Refunded",
        };
        f.write_str(s)
    }
}

/// Result of attempting a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The request moved from `Pending` to the target status.
    Applied,
    /// The request was already terminal and is unchanged.
    AlreadyTerminal(RequestStatus),
}

/// One ad-slot proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRequest {
    /// Pair the request targets.
    pub pair_key: String,
    /// Requesting wallet.
    pub user: String,
    /// Pair creator, or empty when the pair was unknown at submission.
    pub creator: String,
    /// Index into the pair's request slots.
    pub request_index: u32,
    /// Proposed advertisement text.
    pub ad_text: String,
    /// Current status.
    pub status: RequestStatus,
    /// Submission position in the ledger.
    pub position: EventPosition,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last status change.
    pub updated_at: DateTime<Utc>,
}

impl AdRequest {
    /// Builds a pending request from its submission event.
    #[must_use]
    pub fn submitted(
        event: &RequestSubmitted,
        creator: String,
        position: EventPosition,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            pair_key: event.pair_key.clone(),
            user: event.user.clone(),
            creator,
            request_index: event.request_index,
            ad_text: event.ad_text.clone(),
            status: RequestStatus::Pending,
            position,
            created_at: at,
            updated_at: at,
        }
    }

    /// Returns `true` if this request was recorded from `event` at
    /// `position`.
    #[must_use]
    pub fn submitted_by(&self, event: &RequestSubmitted, position: EventPosition) -> bool {
        self.position == position
            && self.pair_key == event.pair_key
            && self.user == event.user
            && self.request_index == event.request_index
    }

    /// Returns `true` if this request is the one a resolution targets.
    ///
    /// `user` and `request_index` must match. The pair key narrows the
    /// match when the event carries one, and the creator narrows it when
    /// both sides know it.
    #[must_use]
    pub fn matches(&self, event: &RequestResolved) -> bool {
        if self.user != event.user || self.request_index != event.request_index {
            return false;
        }
        if let Some(pair_key) = event.pair_key.as_deref()
            && self.pair_key != pair_key
        {
            return false;
        }
        self.creator.is_empty() || event.creator.is_empty() || self.creator == event.creator
    }

    /// Moves a pending request to `target`; terminal requests are left
    /// untouched.
    pub fn transition(&mut self, target: RequestStatus, at: DateTime<Utc>) -> Transition {
        if self.status.is_terminal() {
            return Transition::AlreadyTerminal(self.status);
        }
        self.status = target;
        self.updated_at = at;
        Transition::Applied
    }
}
