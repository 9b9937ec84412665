//! JSON envelope types for CLI output.
//!
//! Every line written to stdout is one envelope, so downstream tools can
//! consume a replay as NDJSON.

use crate::geo::CanonicalLocation;
use crate::pipeline::StabilizedResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current version of the envelope layout.
pub const ENVELOPE_VERSION: &str = "1.0";

/// JSON envelope wrapping all CLI output events.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct JsonEnvelope<T> {
    /// Envelope layout version.
    pub envelope_version: String,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// Event type.
    pub event: EventType,
    /// Event-specific payload.
    pub payload: T,
}

impl<T: Serialize> JsonEnvelope<T> {
    /// Create a new envelope with the current timestamp.
    pub fn new(event: EventType, payload: T) -> Self {
        Self {
            envelope_version: ENVELOPE_VERSION.to_string(),
            timestamp: Utc::now(),
            event,
            payload,
        }
    }
}

/// Event types for JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// One replayed frame.
    Frame,
    /// Final result of a command.
    Result,
}

/// Result type discriminator for result payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Still-image predictions.
    Image,
    /// Geomodel predictions for a location.
    Geomodel,
    /// Replay summary.
    Replay,
    /// Canonical grid location.
    Cell,
    /// Configuration display.
    Config,
}

/// Result payload: a discriminator plus the command's own fields.
#[derive(Debug, Serialize)]
pub struct ResultPayload<'a, T> {
    /// Result type discriminator.
    pub result_type: ResultType,
    /// Command result.
    #[serde(flatten)]
    pub data: &'a T,
}

/// Payload for `frame` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePayload {
    /// Zero-based frame index within the recording.
    pub index: usize,
    /// Stabilized result, absent while nothing has been produced yet.
    pub result: Option<StabilizedResult>,
}

/// Summary emitted after the last replayed frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Frames read from the recording.
    pub frames: usize,
    /// Frames that produced a stabilized result.
    pub stabilized: usize,
}

/// Payload for the cell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellPayload {
    /// Resolved location.
    pub location: CanonicalLocation,
    /// Geomodel input features, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<[f32; 5]>,
}
