//! Event envelope and the per-stream frame.

use serde::{Deserialize, Serialize};
use sse_hub_core::error::CoreError;
use sse_hub_core::types::{ClientId, SubscriptionId};

/// A named event addressed to every open stream of one client.
///
/// This is also the wire form on the shared broadcast channel and the body
/// of a publish request: `{"id": <client>, "name": <name>, "data": <any>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Target client.
    #[serde(rename = "id")]
    pub client_id: ClientId,

    /// Event name, emitted as the `event:` field of each frame.
    pub name: String,

    /// Arbitrary payload; the hub never looks inside it.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(client_id: ClientId, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            client_id,
            name: name.into(),
            data,
        }
    }

    /// Reject names that cannot be written as a single `event:` line.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.is_empty() {
            return Err(CoreError::Validation("event name must not be empty".into()));
        }
        if self.name.contains(|c: char| matches!(c, '\r' | '\n')) {
            return Err(CoreError::Validation(
                "event name must not contain line breaks".into(),
            ));
        }
        Ok(())
    }
}

/// One frame written to one subscription's stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Subscription the event was originally written to. For replayed
    /// frames this is the id of the earlier connection.
    pub id: SubscriptionId,
    pub name: String,
    pub data: serde_json::Value,
}
