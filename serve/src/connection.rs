//! Push channel: replays a task's script over one WebSocket connection.
//!
//! Each connection starts from the task's current step, so a late subscriber first receives
//! everything released so far in one chunk. Inbound text (keepalives) is read and ignored.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use task_event::{PushFrame, ResultChunkPayload, StatusPayload};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::response::{send_frame, ApiError};
use crate::script::Task;

/// Handles `GET /ws/tasks/:task_id`: 404 for unknown tasks, else upgrade and replay.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match AppState::get(&state.push_tasks, &task_id) {
        Some(task) => ws.on_upgrade(move |socket| handle_socket(socket, task_id, task)),
        None => ApiError::NotFound(format!("task {} not found", task_id)).into_response(),
    }
}

async fn handle_socket(socket: WebSocket, task_id: String, task: Arc<Task>) {
    let (mut sender, mut receiver) = socket.split();
    let total = task.script.total();
    let mut ticker = tokio::time::interval(task.step_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut sent = 0usize;
    let mut event_id = 0u64;
    let mut announced = false;

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                None | Some(Ok(Message::Close(_))) => {
                    debug!(task_id = %task_id, "subscriber left");
                    return;
                }
                Some(Err(e)) => {
                    warn!(task_id = %task_id, "read error (client closed?): {}", e);
                    return;
                }
                Some(Ok(_)) => continue,
            },
            _ = ticker.tick() => {}
        }

        let step = task.step();
        let mut frames = Vec::new();
        if step > sent || !announced {
            announced = true;
            frames.push(PushFrame::Status {
                payload: StatusPayload {
                    status: task.status(),
                },
            });
        }
        if step > sent {
            frames.push(PushFrame::ResultChunk {
                payload: ResultChunkPayload {
                    chunk_id: Some(event_id.to_string()),
                    data: task.script.chunk_items(sent, step).into(),
                    is_last: step >= total,
                },
            });
            sent = step;
        }
        if sent >= total {
            frames.push(PushFrame::Result {
                payload: task.script.final_payload(),
            });
        }
        for frame in &frames {
            event_id += 1;
            if let Err(e) = send_frame(&mut sender, frame, &task_id, event_id).await {
                warn!(task_id = %task_id, "send failed: {}", e);
                return;
            }
        }
        if sent >= total {
            debug!(task_id = %task_id, frames = event_id, "script finished, closing");
            let _ = sender.close().await;
            return;
        }
    }
}
