//! Envelope writer.

use crate::error::{Error, Result};
use crate::output::envelope::{EventType, JsonEnvelope, ResultPayload, ResultType};
use serde::Serialize;
use std::io::{self, Write};

/// Writes one JSON envelope per line.
pub struct JsonWriter<W: Write> {
    writer: W,
}

impl JsonWriter<io::Stdout> {
    /// Writer on stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonWriter<W> {
    /// Wrap a writer.
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Emit an event.
    pub fn emit<T: Serialize>(&mut self, event: EventType, payload: &T) -> Result<()> {
        let envelope = JsonEnvelope::new(event, payload);
        let json =
            serde_json::to_string(&envelope).map_err(|e| Error::OutputSerialize { source: e })?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Emit a `result` event tagged with `result_type`.
    pub fn emit_result<T: Serialize>(&mut self, result_type: ResultType, data: &T) -> Result<()> {
        self.emit(EventType::Result, &ResultPayload { result_type, data })
    }

    /// Recover the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::output::envelope::{FramePayload, ReplaySummary};

    fn lines(writer: JsonWriter<Vec<u8>>) -> Vec<serde_json::Value> {
        String::from_utf8(writer.into_inner())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_result_payload_is_flattened() {
        let mut writer = JsonWriter::new(Vec::new());
        writer
            .emit_result(
                ResultType::Replay,
                &ReplaySummary {
                    frames: 3,
                    stabilized: 2,
                },
            )
            .unwrap();

        let events = lines(writer);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["envelope_version"], "1.0");
        assert_eq!(events[0]["event"], "result");
        assert_eq!(events[0]["payload"]["result_type"], "replay");
        assert_eq!(events[0]["payload"]["frames"], 3);
    }

    #[test]
    fn test_one_line_per_event() {
        let mut writer = JsonWriter::new(Vec::new());
        for index in 0..3 {
            writer
                .emit(
                    EventType::Frame,
                    &FramePayload {
                        index,
                        result: None,
                    },
                )
                .unwrap();
        }

        let events = lines(writer);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2]["payload"]["index"], 2);
        assert!(events[0]["payload"]["result"].is_null());
    }
}
