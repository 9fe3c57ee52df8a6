//! Single-writer owner of [`RunState`].
//!
//! Sessions and the controller send [`StoreMessage`]s; the store task applies them in arrival
//! order, re-checks run completion on the redraw cadence and publishes snapshots through a
//! `watch` channel. Run-level transitions are published immediately, client changes on the
//! next redraw tick.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::AggregateView;
use crate::event::{ClientEvent, ClientEventKind, StoreMessage};
use crate::reconcile::{MergeOutcome, ResultReconciler};
use crate::state::{RunState, RunStatus};

pub struct StateStore {
    state: RunState,
}

impl StateStore {
    pub fn new(client_count: usize) -> Self {
        Self {
            state: RunState::new(client_count),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Applies one message. Returns true when the state changed.
    pub fn apply(&mut self, msg: StoreMessage) -> bool {
        match msg {
            StoreMessage::Reset { generation } => {
                self.state.reset(generation);
                true
            }
            StoreMessage::Starting { generation } => {
                self.set_status(generation, RunStatus::Starting, None, None)
            }
            StoreMessage::Started {
                generation,
                task_id,
            } => self.set_status(generation, RunStatus::Running, Some(task_id), None),
            StoreMessage::Failed { generation, error } => {
                self.set_status(generation, RunStatus::Error, None, Some(error))
            }
            StoreMessage::Client(event) => self.apply_client(event),
        }
    }

    /// Runs the completion re-check. Returns true when the run moved to DONE.
    pub fn recheck(&mut self) -> bool {
        let done = AggregateView::recheck(&mut self.state);
        if done {
            info!(
                generation = self.state.generation,
                task_id = self.state.task_id.as_deref().unwrap_or(""),
                "all clients completed, run done"
            );
        }
        done
    }

    fn set_status(
        &mut self,
        generation: u64,
        status: RunStatus,
        task_id: Option<String>,
        error: Option<String>,
    ) -> bool {
        if generation != self.state.generation {
            debug!(generation, current = self.state.generation, "stale run message dropped");
            return false;
        }
        self.state.status = status;
        if task_id.is_some() {
            self.state.task_id = task_id;
        }
        if error.is_some() {
            self.state.error = error;
        }
        true
    }

    fn apply_client(&mut self, event: ClientEvent) -> bool {
        let ClientEvent {
            client,
            elapsed,
            kind,
        } = event;
        if client.generation != self.state.generation {
            return false;
        }
        let Some(state) = self.state.client_mut(client.mode, client.index) else {
            warn!(mode = %client.mode, index = client.index, "event for unknown client dropped");
            return false;
        };
        match kind {
            ClientEventKind::Received { bytes } => {
                state.metrics.record_unit(bytes);
                true
            }
            ClientEventKind::DecodeFailed => {
                state.decode_errors += 1;
                true
            }
            ClientEventKind::Status(status) => state.apply_status(&status),
            ClientEventKind::FirstUpdate => state.metrics.mark_first_update(elapsed),
            ClientEventKind::Result(update) => {
                ResultReconciler::merge(state, update) != MergeOutcome::Unchanged
            }
            ClientEventKind::Completed(status) => {
                let changed = state.complete(elapsed, status);
                if changed {
                    info!(
                        mode = %client.mode,
                        client = state.id,
                        status = status.as_str(),
                        total_ms = elapsed.as_millis() as u64,
                        "client completed"
                    );
                }
                changed
            }
            ClientEventKind::Phase(phase) => {
                let changed = state.phase != phase;
                state.phase = phase;
                changed
            }
        }
    }

    /// Spawns the store task.
    pub fn spawn(self, redraw: Duration, queue_capacity: usize) -> StoreHandle {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (snapshots, snapshot_rx) = watch::channel(self.state.clone());
        let cancel = CancellationToken::new();
        let join = tokio::spawn(self.run(rx, snapshots, redraw, cancel.clone()));
        StoreHandle {
            sender: tx,
            snapshots: snapshot_rx,
            cancel,
            join: Some(join),
        }
    }

    async fn run(
        mut self,
        mut rx: mpsc::Receiver<StoreMessage>,
        snapshots: watch::Sender<RunState>,
        redraw: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(redraw);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut dirty = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    let run_level = !matches!(msg, StoreMessage::Client(_));
                    if self.apply(msg) {
                        if run_level {
                            snapshots.send_replace(self.state.clone());
                        } else {
                            dirty = true;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if self.recheck() || dirty {
                        snapshots.send_replace(self.state.clone());
                        dirty = false;
                    }
                }
            }
        }
        while let Ok(msg) = rx.try_recv() {
            self.apply(msg);
        }
        self.recheck();
        snapshots.send_replace(self.state.clone());
        debug!("state store stopped");
    }
}

/// Handle to a running store task.
pub struct StoreHandle {
    sender: mpsc::Sender<StoreMessage>,
    snapshots: watch::Receiver<RunState>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl StoreHandle {
    pub fn sender(&self) -> mpsc::Sender<StoreMessage> {
        self.sender.clone()
    }

    pub async fn send(&self, msg: StoreMessage) {
        if self.sender.send(msg).await.is_err() {
            warn!("state store is gone, message dropped");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RunState {
        self.snapshots.borrow().clone()
    }

    /// Stops the store after applying what is already queued. Idempotent.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(error = %e, "state store task failed");
            }
        }
    }
}
