//! JSON-based EventCodec implementation.

use anyhow::Context;

use crate::application::ports::EventCodec;
use crate::domain::event::{ClientEvent, RawEvent};

/// Encodes / decodes the `{"event": ..., "data": ...}` envelope with
/// `serde_json`.
pub struct JsonEventCodec;

impl EventCodec for JsonEventCodec {
    fn encode(&self, event: &ClientEvent) -> anyhow::Result<String> {
        serde_json::to_string(event).with_context(|| format!("encoding {}", event.name()))
    }

    fn decode(&self, frame: &str) -> anyhow::Result<RawEvent> {
        serde_json::from_str(frame).context("decoding event envelope")
    }
}
