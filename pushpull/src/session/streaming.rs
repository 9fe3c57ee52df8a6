//! Push subscription for one client.
//!
//! `Disconnected -> Connecting -> Connected -> Closed`. While connected a keepalive text is
//! sent on a fixed interval. A channel error or close ends the session without completing the
//! client: a dropped channel is not a finished task.

use std::sync::Arc;
use std::time::Duration;

use task_event::{PushFrame, TaskState};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::{EventSink, SessionHandle};
use crate::event::ClientEventKind;
use crate::reconcile::{fragment_from_value, ResultUpdate};
use crate::state::{ChannelState, ClientStatus, SessionPhase};
use crate::transport::{Frame, TransportClient};

pub struct StreamingSession {
    transport: Arc<dyn TransportClient>,
    task_id: String,
    keepalive: Duration,
    sink: EventSink,
    seen_first: bool,
}

impl StreamingSession {
    pub fn new(
        transport: Arc<dyn TransportClient>,
        task_id: impl Into<String>,
        keepalive: Duration,
        sink: EventSink,
    ) -> Self {
        Self {
            transport,
            task_id: task_id.into(),
            keepalive,
            sink,
            seen_first: false,
        }
    }

    pub fn spawn(self) -> SessionHandle {
        let client = self.sink.client();
        let span = tracing::info_span!(
            "session",
            mode = "streaming",
            client = client.index + 1,
            task_id = %self.task_id
        );
        let cancel = CancellationToken::new();
        let fut = self.run(cancel.clone()).instrument(span);
        SessionHandle::spawn(client, cancel, fut)
    }

    async fn phase(&self, state: ChannelState) {
        self.sink
            .emit(ClientEventKind::Phase(SessionPhase::Channel(state)))
            .await;
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        self.phase(ChannelState::Connecting).await;
        let opened = tokio::select! {
            _ = cancel.cancelled() => None,
            r = self.transport.open_channel(&self.task_id) => match r {
                Ok(channel) => Some(channel),
                Err(e) => {
                    warn!(error = %e, "push channel connect failed");
                    None
                }
            },
        };
        let Some(mut channel) = opened else {
            self.phase(ChannelState::Closed).await;
            return;
        };
        self.phase(ChannelState::Connected).await;
        info!("push channel connected");

        let mut keepalive = tokio::time::interval_at(Instant::now() + self.keepalive, self.keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = keepalive.tick() => {
                    if let Err(e) = channel.send_keepalive().await {
                        warn!(error = %e, "keepalive failed, closing");
                        break;
                    }
                }
                next = channel.next_frame() => match next {
                    None => {
                        debug!("push channel closed by peer");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "push channel error");
                        break;
                    }
                    Some(Ok(frame)) => {
                        if self.handle_frame(frame).await {
                            break;
                        }
                    }
                },
            }
        }
        channel.close().await;
        self.phase(ChannelState::Closed).await;
    }

    /// Applies one frame. Returns true on a terminal frame.
    async fn handle_frame(&mut self, frame: Frame) -> bool {
        self.sink
            .emit(ClientEventKind::Received { bytes: frame.bytes })
            .await;
        let decoded: PushFrame = match serde_json::from_str(&frame.text) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, bytes = frame.bytes, "malformed push frame dropped");
                self.sink.emit(ClientEventKind::DecodeFailed).await;
                return false;
            }
        };
        if !self.seen_first {
            self.seen_first = true;
            self.sink.emit(ClientEventKind::FirstUpdate).await;
        }
        match decoded {
            PushFrame::Status { payload } => {
                let state = payload.status.state;
                self.sink
                    .emit(ClientEventKind::Status(payload.status))
                    .await;
                if state.is_some_and(TaskState::is_failure) {
                    info!(state = ?state, "task ended without result");
                    self.sink
                        .emit(ClientEventKind::Completed(ClientStatus::Error))
                        .await;
                    return true;
                }
                false
            }
            PushFrame::ResultChunk { payload } => {
                let fragments: Vec<_> = payload.items().iter().filter_map(fragment_from_value).collect();
                if !fragments.is_empty() {
                    self.sink
                        .emit(ClientEventKind::Result(ResultUpdate::Append(fragments)))
                        .await;
                }
                if payload.is_last {
                    self.sink
                        .emit(ClientEventKind::Completed(ClientStatus::Completed))
                        .await;
                    return true;
                }
                false
            }
            PushFrame::Result { .. } => {
                self.sink
                    .emit(ClientEventKind::Completed(ClientStatus::Completed))
                    .await;
                true
            }
            PushFrame::Unknown => {
                debug!("unhandled push frame type ignored");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClientRef, StoreMessage};
    use crate::reconcile::Fragment;
    use crate::state::Mode;
    use crate::transport::testing::{ScriptedChannel, ScriptedTransport};
    use crate::error::TransportError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn client() -> ClientRef {
        ClientRef {
            generation: 1,
            mode: Mode::Streaming,
            index: 0,
        }
    }

    fn transport(
        frames: Vec<Result<Frame, TransportError>>,
        close_after_script: bool,
        keepalives: Arc<AtomicUsize>,
    ) -> Arc<ScriptedTransport> {
        let mut t = ScriptedTransport::new();
        let frames = std::sync::Mutex::new(Some(frames));
        t.channel = Box::new(move || {
            let frames = frames.lock().unwrap().take().unwrap_or_default();
            Ok(ScriptedChannel {
                frames: VecDeque::from(frames),
                close_after_script,
                keepalives: keepalives.clone(),
                frame_delay: Duration::ZERO,
            })
        });
        Arc::new(t)
    }

    async fn run_session(
        t: Arc<ScriptedTransport>,
        keepalive: Duration,
        cancel_after: Option<Duration>,
    ) -> Vec<ClientEventKind> {
        let (tx, mut rx) = mpsc::channel(64);
        let session = StreamingSession::new(t, "t1", keepalive, EventSink::new(tx, client()));
        let cancel = CancellationToken::new();
        if let Some(after) = cancel_after {
            let c = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                c.cancel();
            });
        }
        let run = tokio::spawn(session.run(cancel));
        let mut kinds = Vec::new();
        while let Some(StoreMessage::Client(ev)) = rx.recv().await {
            kinds.push(ev.kind);
        }
        run.await.unwrap();
        kinds
    }

    fn bytes_of(kinds: &[ClientEventKind]) -> (u64, u64) {
        kinds.iter().fold((0, 0), |(n, b), k| match k {
            ClientEventKind::Received { bytes } => (n + 1, b + bytes),
            _ => (n, b),
        })
    }

    #[tokio::test]
    async fn chunks_append_and_last_chunk_completes() {
        let frames = vec![
            Ok(Frame::text(r#"{"type":"task.status","payload":{"status":{"state":"RUNNING","progress":{"percentage":0.5}}}}"#)),
            Ok(Frame::text(r#"{"type":"task.result_chunk","payload":{"data":["3","."],"is_last":false}}"#)),
            Ok(Frame::text(r#"{"type":"task.result_chunk","payload":{"data":["1","4"],"is_last":true}}"#)),
            Ok(Frame::text(r#"{"type":"task.result","payload":{}}"#)),
        ];
        let t = transport(frames, false, Arc::new(AtomicUsize::new(0)));
        let kinds = run_session(t, Duration::from_secs(60), None).await;

        let appended: Vec<&Vec<Fragment>> = kinds
            .iter()
            .filter_map(|k| match k {
                ClientEventKind::Result(ResultUpdate::Append(f)) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(appended.len(), 2);
        assert_eq!(appended[1], &vec![Fragment::Text("1".into()), Fragment::Text("4".into())]);
        let completions = kinds
            .iter()
            .filter(|k| matches!(k, ClientEventKind::Completed(ClientStatus::Completed)))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(bytes_of(&kinds).0, 3);
        assert_eq!(
            kinds.last(),
            Some(&ClientEventKind::Phase(SessionPhase::Channel(ChannelState::Closed)))
        );
    }

    #[tokio::test]
    async fn malformed_frames_are_counted_and_dropped() {
        let frames = vec![
            Ok(Frame::text("x".repeat(10))),
            Ok(Frame::text(format!(r#"{{"type":"task.note","pad":"{}"}}"#, "y".repeat(2)))),
            Ok(Frame::text("z".repeat(30))),
        ];
        let sizes: Vec<u64> = frames.iter().map(|f| f.as_ref().unwrap().bytes).collect();
        let t = transport(frames, true, Arc::new(AtomicUsize::new(0)));
        let kinds = run_session(t, Duration::from_secs(60), None).await;

        let (units, bytes) = bytes_of(&kinds);
        assert_eq!(units, 3);
        assert_eq!(bytes, sizes.iter().sum::<u64>());
        let decode_failures = kinds
            .iter()
            .filter(|k| matches!(k, ClientEventKind::DecodeFailed))
            .count();
        assert_eq!(decode_failures, 2);
        // The unknown-type frame decoded, so it is the first update.
        assert_eq!(
            kinds.iter().filter(|k| matches!(k, ClientEventKind::FirstUpdate)).count(),
            1
        );
        assert!(!kinds.iter().any(|k| matches!(k, ClientEventKind::Completed(_))));
    }

    #[tokio::test]
    async fn channel_close_does_not_complete() {
        let frames = vec![Ok(Frame::text(
            r#"{"type":"task.result_chunk","payload":{"data":["3"],"is_last":false}}"#,
        ))];
        let t = transport(frames, true, Arc::new(AtomicUsize::new(0)));
        let kinds = run_session(t, Duration::from_secs(60), None).await;
        assert!(!kinds.iter().any(|k| matches!(k, ClientEventKind::Completed(_))));
        assert!(kinds.contains(&ClientEventKind::Phase(SessionPhase::Channel(ChannelState::Closed))));
    }

    #[tokio::test]
    async fn failed_status_is_terminal_with_error() {
        let frames = vec![Ok(Frame::text(
            r#"{"type":"task.status","payload":{"status":{"state":"FAILED","progress":{}}}}"#,
        ))];
        let t = transport(frames, false, Arc::new(AtomicUsize::new(0)));
        let kinds = run_session(t, Duration::from_secs(60), None).await;
        assert!(kinds.contains(&ClientEventKind::Completed(ClientStatus::Error)));
    }

    #[tokio::test]
    async fn keepalive_ticks_while_connected() {
        let keepalives = Arc::new(AtomicUsize::new(0));
        let t = transport(vec![], false, keepalives.clone());
        run_session(t, Duration::from_millis(20), Some(Duration::from_millis(150))).await;
        let sent = keepalives.load(Ordering::SeqCst);
        assert!(sent >= 3, "expected several keepalives, got {}", sent);
    }

    #[tokio::test]
    async fn connect_failure_closes_without_events() {
        let t = Arc::new(ScriptedTransport::new());
        let kinds = run_session(t, Duration::from_secs(1), None).await;
        assert_eq!(
            kinds,
            vec![
                ClientEventKind::Phase(SessionPhase::Channel(ChannelState::Connecting)),
                ClientEventKind::Phase(SessionPhase::Channel(ChannelState::Closed)),
            ]
        );
    }
}
