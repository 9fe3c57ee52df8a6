//! Push-channel frames (type + payload).
//!
//! Wire shape: `{"type":"task.status","payload":{"status":{...}}}`,
//! `{"type":"task.result_chunk","payload":{"data":[...],"is_last":false}}`,
//! `{"type":"task.result","payload":{...}}`. Envelope fields the backend adds
//! (`event_id`, `task_id`, `ts`, `version`) are accepted and ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::TaskStatus;

/// Payload of a `task.status` frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    #[serde(default)]
    pub status: TaskStatus,
}

/// Payload of a `task.result_chunk` frame.
///
/// `data` stays a raw [`Value`]: a list of new items in the normal case, but a scalar or
/// null must not make the whole frame (and its `is_last` flag) undecodable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultChunkPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub is_last: bool,
}

impl ResultChunkPayload {
    /// Items carried by this chunk, in delivery order. Non-list `data` carries none.
    pub fn items(&self) -> &[Value] {
        match &self.data {
            Value::Array(items) => items,
            _ => &[],
        }
    }
}

/// One frame on the push channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushFrame {
    #[serde(rename = "task.status")]
    Status {
        #[serde(default)]
        payload: StatusPayload,
    },
    #[serde(rename = "task.result_chunk")]
    ResultChunk {
        #[serde(default)]
        payload: ResultChunkPayload,
    },
    #[serde(rename = "task.result")]
    Result {
        #[serde(default)]
        payload: Value,
    },
    /// Frame types this client does not handle.
    #[serde(other)]
    Unknown,
}

impl PushFrame {
    /// Serializes this frame to its JSON text.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
