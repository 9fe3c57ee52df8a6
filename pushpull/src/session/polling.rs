//! Pull loop for one client.
//!
//! `Idle -> Polling -> Stopped`. Each tick fetches progress then the result, strictly in
//! sequence; the next tick is not awaited until both round-trips resolved, and missed ticks
//! are skipped, so a client never has more than one round-trip pair outstanding.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use task_event::{ResultResponse, SnippetsResponse, TaskState, TaskStatus};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

use super::{EventSink, SessionHandle};
use crate::event::ClientEventKind;
use crate::reconcile::{CursorItem, ResultUpdate};
use crate::state::{ClientStatus, PollState, SessionPhase};
use crate::task::{ResultShape, TaskEndpoints};
use crate::transport::{HttpResponse, TransportClient};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tick {
    Continue,
    Terminal,
}

pub struct PollingSession {
    transport: Arc<dyn TransportClient>,
    task_id: String,
    endpoints: TaskEndpoints,
    shape: ResultShape,
    interval: Duration,
    sink: EventSink,
    seen_first: bool,
    /// Local copy of the cursor, used for the `after` query parameter.
    cursor: Option<u64>,
}

impl PollingSession {
    pub fn new(
        transport: Arc<dyn TransportClient>,
        task_id: impl Into<String>,
        endpoints: TaskEndpoints,
        shape: ResultShape,
        interval: Duration,
        sink: EventSink,
    ) -> Self {
        Self {
            transport,
            task_id: task_id.into(),
            endpoints,
            shape,
            interval,
            sink,
            seen_first: false,
            cursor: None,
        }
    }

    pub fn spawn(self) -> SessionHandle {
        let client = self.sink.client();
        let span = tracing::info_span!(
            "session",
            mode = "polling",
            client = client.index + 1,
            task_id = %self.task_id
        );
        let cancel = CancellationToken::new();
        let fut = self.run(cancel.clone()).instrument(span);
        SessionHandle::spawn(client, cancel, fut)
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        self.sink
            .emit(ClientEventKind::Phase(SessionPhase::Poll(PollState::Polling)))
            .await;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            // An in-flight round-trip is abandoned on stop; its events would be stale anyway.
            let tick = tokio::select! {
                _ = cancel.cancelled() => break,
                tick = self.tick() => tick,
            };
            if tick == Tick::Terminal {
                debug!("task finished, polling stopped");
                break;
            }
        }
        self.sink
            .emit(ClientEventKind::Phase(SessionPhase::Poll(PollState::Stopped)))
            .await;
    }

    async fn tick(&mut self) -> Tick {
        let query = [("task_id", self.task_id.clone())];
        let Some(resp) = self.fetch(self.endpoints.progress, &query).await else {
            return Tick::Continue;
        };
        let status: Option<TaskStatus> = self.decode(&resp, "progress").await;
        if let Some(status) = &status {
            self.sink
                .emit(ClientEventKind::Status(status.clone()))
                .await;
            if has_progress(status) {
                self.first_update().await;
            }
        }

        let mut query = vec![("task_id", self.task_id.clone())];
        if let (ResultShape::Cursor, Some(after)) = (self.shape, self.cursor) {
            query.push(("after", after.to_string()));
        }
        let Some(resp) = self.fetch(self.endpoints.result, &query).await else {
            return Tick::Continue;
        };
        let merged = match self.shape {
            ResultShape::Snapshot => self.merge_snapshot(&resp).await,
            ResultShape::Cursor => self.merge_cursor(&resp).await.then_some(false),
        };
        let state = status.as_ref().and_then(|s| s.state);
        // A failed task ends the client whatever the result fetch returned.
        if state.is_some_and(TaskState::is_failure) {
            warn!(state = ?state, "task ended without result");
            self.sink
                .emit(ClientEventKind::Completed(ClientStatus::Error))
                .await;
            return Tick::Terminal;
        }

        // COMPLETED only counts once this tick's result was read; else the next tick retries.
        let Some(done) = merged else {
            return Tick::Continue;
        };
        if done || state == Some(TaskState::Completed) {
            self.sink
                .emit(ClientEventKind::Completed(ClientStatus::Completed))
                .await;
            return Tick::Terminal;
        }
        Tick::Continue
    }

    /// One request, always counted. `None` on a transport failure (counted with 0 bytes).
    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Option<HttpResponse> {
        match self.transport.get_json(path, query).await {
            Ok(resp) => {
                self.sink
                    .emit(ClientEventKind::Received { bytes: resp.bytes() })
                    .await;
                Some(resp)
            }
            Err(e) => {
                self.sink
                    .emit(ClientEventKind::Received { bytes: 0 })
                    .await;
                warn!(path, error = %e, "poll request failed");
                None
            }
        }
    }

    async fn decode<T: DeserializeOwned>(&self, resp: &HttpResponse, what: &str) -> Option<T> {
        match resp.json() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(what, status = resp.status, error = %e, "poll response discarded");
                self.sink.emit(ClientEventKind::DecodeFailed).await;
                None
            }
        }
    }

    async fn first_update(&mut self) {
        if !self.seen_first {
            self.seen_first = true;
            self.sink.emit(ClientEventKind::FirstUpdate).await;
        }
    }

    /// Returns the `done` flag, or `None` when the body could not be merged.
    async fn merge_snapshot(&mut self, resp: &HttpResponse) -> Option<bool> {
        let result = self.decode::<ResultResponse>(resp, "result").await?;
        self.sink
            .emit(ClientEventKind::Result(ResultUpdate::Snapshot(
                result.snapshot_text(),
            )))
            .await;
        Some(result.done)
    }

    /// Returns false when the page could not be decoded.
    async fn merge_cursor(&mut self, resp: &HttpResponse) -> bool {
        let Some(page) = self.decode::<SnippetsResponse>(resp, "snippets").await else {
            return false;
        };
        let cursor = self.cursor;
        let fresh = page
            .snippets
            .iter()
            .any(|s| match (s.id, cursor) {
                (Some(id), Some(seen)) => id > seen,
                _ => true,
            });
        let max_id = page.snippets.iter().filter_map(|s| s.id).max();
        self.cursor = [cursor, page.last_id, max_id].into_iter().flatten().max();

        let items: Vec<CursorItem> = page.snippets.iter().map(CursorItem::from).collect();
        if !items.is_empty() || page.last_id.is_some() {
            self.sink
                .emit(ClientEventKind::Result(ResultUpdate::Cursor {
                    items,
                    last_id: page.last_id,
                }))
                .await;
        }
        if fresh {
            self.first_update().await;
        }
        true
    }
}

/// RUNNING with a non-zero fraction or counter.
fn has_progress(status: &TaskStatus) -> bool {
    let p = &status.progress;
    status.state == Some(TaskState::Running)
        && (p.percentage.is_some_and(|v| v > 0.0) || p.current.is_some_and(|v| v > 0))
}
