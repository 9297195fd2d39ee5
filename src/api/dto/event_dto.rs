//! Event intake DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::EventEnvelope;

/// One ledger event as posted by the event source.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelopeDto {
    /// Event kind, e.g. `SwapExecuted`.
    pub kind: String,
    /// Kind-specific payload.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Ledger slot.
    pub slot: u64,
    /// Index within the slot.
    #[serde(default)]
    pub index: u32,
    /// Block time in unix seconds.
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// Request body for `POST /api/v1/events`: one envelope or a batch.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum IngestRequest {
    /// A batch, delivered in array order.
    Batch(Vec<EventEnvelopeDto>),
    /// A single envelope.
    Single(EventEnvelopeDto),
}

/// Response body for `POST /api/v1/events` (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    /// Envelopes queued for projection.
    pub accepted: usize,
}

impl From<EventEnvelopeDto> for EventEnvelope {
    fn from(dto: EventEnvelopeDto) -> Self {
        Self {
            kind: dto.kind,
            payload: dto.payload,
            slot: dto.slot,
            index: dto.index,
            block_time: dto.block_time,
        }
    }
}

impl IngestRequest {
    /// Envelopes in delivery order.
    #[must_use]
    pub fn into_envelopes(self) -> Vec<EventEnvelope> {
        match self {
            Self::Batch(batch) => batch.into_iter().map(Into::into).collect(),
            Self::Single(one) => vec![one.into()],
        }
    }
}
