//! Socket wire envelope.
//!
//! Both directions use the same shape: `{"event": "<name>", "data": <json>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event frame on the socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Event name (e.g. `order:update`).
    pub event: String,
    /// Event payload. Missing `data` deserializes as `null`.
    #[serde(default)]
    pub data: Value,
}

impl WireMessage {
    /// Build a message.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
