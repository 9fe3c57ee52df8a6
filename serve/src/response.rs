//! Error responses and push-frame envelopes.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::ws::{Message, WebSocket},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{stream::SplitSink, SinkExt};
use serde_json::{json, Value};
use task_event::PushFrame;

/// Handler error rendered as `{"detail": ...}`.
#[derive(Debug)]
pub(crate) enum ApiError {
    NotFound(String),
    Invalid(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, d),
            ApiError::Invalid(d) => (StatusCode::UNPROCESSABLE_ENTITY, d),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Frame JSON with the envelope fields (`event_id`, `task_id`, `ts`, `version`) merged in.
pub(crate) fn envelope(frame: &PushFrame, task_id: &str, event_id: u64) -> Value {
    let mut value = serde_json::to_value(frame).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        map.insert("event_id".into(), json!(format!("{}-{}", task_id, event_id)));
        map.insert("task_id".into(), json!(task_id));
        map.insert("ts".into(), json!(ts));
        map.insert("version".into(), json!(1));
    }
    value
}

/// Sends one enveloped frame as a text message.
pub(crate) async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &PushFrame,
    task_id: &str,
    event_id: u64,
) -> Result<(), axum::Error> {
    let text = envelope(frame, task_id, event_id).to_string();
    sender.send(Message::Text(text)).await
}
