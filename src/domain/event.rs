//! Inbound ledger events and their wire envelope.
//!
//! The event source delivers [`EventEnvelope`]s carrying an untyped JSON
//! payload. [`EventEnvelope::decode`] turns an envelope into a typed
//! [`LedgerEvent`]; anything that does not decode is a malformed payload
//! and is never retried.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Position of an event in the ledger: slot, then index within the slot.
///
/// Positions are totally ordered and used both to sequence swaps on a
/// pair and to recognise redelivered events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    /// Ledger slot the event was emitted in.
    pub slot: u64,
    /// Index of the event within its slot.
    pub index: u32,
}

impl EventPosition {
    /// Creates a position.
    #[must_use]
    pub const fn new(slot: u64, index: u32) -> Self {
        Self { slot, index }
    }
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot, self.index)
    }
}

/// Event kinds understood by the projection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A new bonding-curve pair was created.
    PairCreated,
    /// A buy or sell executed against a pair.
    SwapExecuted,
    /// A user proposed an ad slot to a pair creator.
    RequestSubmitted,
    /// The creator accepted an ad-slot request.
    RequestAccepted,
    /// The creator rejected an ad-slot request.
    RequestRejected,
    /// An ad-slot request was refunded to the user.
    RequestRefunded,
}

impl EventKind {
    /// Parses the wire name of an event kind.
    ///
    /// Accepts both the `PascalCase` names and the `camelCase` names used
    /// by Anchor event listeners.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "PairCreated" | "pairCreated" => Some(Self::PairCreated),
            "SwapExecuted" | "swapExecuted" | "swap" => Some(Self::SwapExecuted),
            "RequestSubmitted" | "requestSubmitted" => Some(Self::RequestSubmitted),
            "RequestAccepted" | "requestAccepted" => Some(Self::RequestAccepted),
            "RequestRejected" | "requestRejected" => Some(Self::RequestRejected),
            "RequestRefunded" | "requestRefunded" => Some(Self::RequestRefunded),
            _ => None,
        }
    }

    /// Returns the canonical kind name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PairCreated => "PairCreated",
            Self::SwapExecuted => "SwapExecuted",
            Self::RequestSubmitted => "RequestSubmitted",
            Self::RequestAccepted => "RequestAccepted",
            Self::RequestRejected => "RequestRejected",
            Self::RequestRefunded => "RequestRefunded",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped event as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Event kind name (see [`EventKind::parse`]).
    pub kind: String,
    /// Kind-specific JSON payload.
    pub payload: serde_json::Value,
    /// Ledger slot.
    pub slot: u64,
    /// Index of the event within the slot.
    #[serde(default)]
    pub index: u32,
    /// Block time in unix seconds, when the source knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

impl EventEnvelope {
    /// Builds an envelope from a typed kind and payload.
    #[must_use]
    pub fn new(kind: EventKind, payload: serde_json::Value, slot: u64, index: u32) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            payload,
            slot,
            index,
            block_time: None,
        }
    }

    /// Position of this event in the ledger.
    #[must_use]
    pub const fn position(&self) -> EventPosition {
        EventPosition::new(self.slot, self.index)
    }

    /// Decodes the payload into a typed [`LedgerEvent`].
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the kind is unknown, the payload does
    /// not match the kind's schema, or a required identifier is blank.
    pub fn decode(&self) -> Result<LedgerEvent, DecodeError> {
        let kind = EventKind::parse(&self.kind)
            .ok_or_else(|| DecodeError::UnknownKind(self.kind.clone()))?;
        let event = match kind {
            EventKind::PairCreated => LedgerEvent::PairCreated(self.payload_as(kind)?),
            EventKind::SwapExecuted => LedgerEvent::SwapExecuted(self.payload_as(kind)?),
            EventKind::RequestSubmitted => LedgerEvent::RequestSubmitted(self.payload_as(kind)?),
            EventKind::RequestAccepted => LedgerEvent::RequestAccepted(self.payload_as(kind)?),
            EventKind::RequestRejected => LedgerEvent::RequestRejected(self.payload_as(kind)?),
            EventKind::RequestRefunded => LedgerEvent::RequestRefunded(self.payload_as(kind)?),
        };
        event.validate()?;
        Ok(event)
    }

    fn payload_as<T: serde::de::DeserializeOwned>(&self, kind: EventKind) -> Result<T, DecodeError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| DecodeError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }
}

/// Payload decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The envelope names an event kind this indexer does not know.
    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    /// The payload does not match the schema of its kind.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// Kind the payload was decoded as.
        kind: EventKind,
        /// Decoder message.
        reason: String,
    },

    /// A required identifier field is empty.
    #[error("{kind} payload has empty field `{field}`")]
    MissingField {
        /// Kind of the offending event.
        kind: EventKind,
        /// Name of the blank field.
        field: &'static str,
    },
}

/// Emitted once when a pair account is initialised on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairCreated {
    /// Factory creation sequence number.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub pair_id: u64,
    /// Pair account address.
    pub pair_key: String,
    /// Creator wallet address.
    pub creator: String,
    /// Base price configured by the creator.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub base_price: u64,
}

/// Emitted for every executed buy or sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapExecuted {
    /// `true` for a buy (collateral in, attention token out).
    pub is_buy: bool,
    /// Units paid in.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub amount_in: u64,
    /// Units paid out.
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub amount_out: u64,
    /// Trader wallet address.
    pub user: String,
    /// Pair account address.
    pub pair_key: String,
    /// Attention token mint traded.
    #[serde(default)]
    pub attention_token: String,
}

/// Emitted when a user submits an ad-slot request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSubmitted {
    /// Pair the request targets.
    pub pair_key: String,
    /// Requesting wallet address.
    pub user: String,
    /// Index into the pair's configured request slots.
    pub request_index: u32,
    /// Proposed advertisement text.
    #[serde(default)]
    pub ad_text: String,
}

/// Emitted when a request is accepted, rejected or refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResolved {
    /// Pair creator who resolved the request.
    #[serde(default)]
    pub creator: String,
    /// Index into the pair's configured request slots.
    pub request_index: u32,
    /// Requesting wallet address.
    pub user: String,
    /// Resolution time in unix seconds.
    #[serde(default)]
    pub timestamp: i64,
    /// Pair the request targets, when the emitter includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_key: Option<String>,
}

/// Typed ledger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// See [`PairCreated`].
    PairCreated(PairCreated),
    /// See [`SwapExecuted`].
    SwapExecuted(SwapExecuted),
    /// See [`RequestSubmitted`].
    RequestSubmitted(RequestSubmitted),
    /// Request moved to `Accepted`.
    RequestAccepted(RequestResolved),
    /// Request moved to `Rejected`.
    RequestRejected(RequestResolved),
    /// Request moved to `Refunded`.
    RequestRefunded(RequestResolved),
}

impl LedgerEvent {
    /// Kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PairCreated(_) => EventKind::PairCreated,
            Self::SwapExecuted(_) => EventKind::SwapExecuted,
            Self::RequestSubmitted(_) => EventKind::RequestSubmitted,
            Self::RequestAccepted(_) => EventKind::RequestAccepted,
            Self::RequestRejected(_) => EventKind::RequestRejected,
            Self::RequestRefunded(_) => EventKind::RequestRefunded,
        }
    }

    /// Key of the entity whose ordering this event participates in.
    ///
    /// Pair-scoped events return the pair key; resolutions without a pair
    /// key are ordered per user.
    #[must_use]
    pub fn entity_key(&self) -> &str {
        match self {
            Self::PairCreated(e) => &e.pair_key,
            Self::SwapExecuted(e) => &e.pair_key,
            Self::RequestSubmitted(e) => &e.pair_key,
            Self::RequestAccepted(e) | Self::RequestRejected(e) | Self::RequestRefunded(e) => {
                e.pair_key.as_deref().unwrap_or(&e.user)
            }
        }
    }

    fn validate(&self) -> Result<(), DecodeError> {
        let kind = self.kind();
        let blank = |field: &'static str, value: &str| {
            if value.trim().is_empty() {
                Err(DecodeError::MissingField { kind, field })
            } else {
                Ok(())
            }
        };
        match self {
            Self::PairCreated(e) => {
                blank("pairKey", &e.pair_key)?;
                blank("creator", &e.creator)
            }
            Self::SwapExecuted(e) => {
                blank("pairKey", &e.pair_key)?;
                blank("user", &e.user)
            }
            Self::RequestSubmitted(e) => {
                blank("pairKey", &e.pair_key)?;
                blank("user", &e.user)
            }
            Self::RequestAccepted(e) | Self::RequestRejected(e) | Self::RequestRefunded(e) => {
                blank("user", &e.user)
            }
        }
    }
}

/// Accepts a `u64` encoded either as a JSON number or a decimal string.
///
/// Ledger clients commonly render 64-bit integers as strings to avoid
/// precision loss in JavaScript.
fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
