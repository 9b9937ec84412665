//! JSON output for CLI commands.

mod envelope;
mod writer;

pub use envelope::{
    CellPayload, EventType, FramePayload, JsonEnvelope, ReplaySummary, ResultPayload, ResultType,
    ENVELOPE_VERSION,
};
pub use writer::JsonWriter;
