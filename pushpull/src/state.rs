//! Per-client and per-run state owned by the [`StateStore`](crate::store::StateStore).
//!
//! Nothing here is shared mutably: sessions describe changes as events and the store is the
//! only writer. Presentation reads cloned snapshots.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use task_event::{TaskState, TaskStatus};

/// Transport mode of a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Streaming,
    Polling,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Streaming, Mode::Polling];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Streaming => "streaming",
            Mode::Polling => "polling",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side view of the task state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl ClientStatus {
    /// Missing or unrecognised server states count as running.
    pub fn from_task_state(state: Option<TaskState>) -> Self {
        match state {
            Some(TaskState::Queued) => Self::Idle,
            Some(TaskState::Completed) => Self::Completed,
            Some(TaskState::Failed) | Some(TaskState::Cancelled) => Self::Error,
            Some(TaskState::Running) | Some(TaskState::Unknown) | None => Self::Running,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }
}

/// Timing and throughput counters of one client. Times are measured from session start.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientMetrics {
    pub first_update: Option<Duration>,
    pub total: Option<Duration>,
    /// Messages received (streaming) or requests issued (polling).
    pub units: u64,
    pub bytes: u64,
}

impl ClientMetrics {
    pub fn record_unit(&mut self, bytes: u64) {
        self.units = self.units.saturating_add(1);
        self.bytes = self.bytes.saturating_add(bytes);
    }

    /// Sets time-to-first-update; only the first call has an effect.
    pub fn mark_first_update(&mut self, at: Duration) -> bool {
        if self.first_update.is_some() {
            return false;
        }
        self.first_update = Some(at);
        true
    }

    /// Sets total duration; only the first call has an effect.
    pub fn mark_total(&mut self, at: Duration) -> bool {
        if self.total.is_some() {
            return false;
        }
        self.total = Some(at);
        true
    }
}

/// Accumulated result text plus the cursors the reconciler keeps.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultBuffer {
    pub(crate) text: String,
    pub(crate) rendered_len: usize,
    pub(crate) last_seen_id: Option<u64>,
}

impl ResultBuffer {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte length of the text already handed downstream.
    pub fn rendered_len(&self) -> usize {
        self.rendered_len
    }

    /// Highest item id merged from a cursor-shaped fetch.
    pub fn last_seen_id(&self) -> Option<u64> {
        self.last_seen_id
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Stopped,
}

/// Where the owning session is in its state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Channel(ChannelState),
    Poll(PollState),
}

impl SessionPhase {
    pub fn initial(mode: Mode) -> Self {
        match mode {
            Mode::Streaming => SessionPhase::Channel(ChannelState::Disconnected),
            Mode::Polling => SessionPhase::Poll(PollState::Idle),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Channel(ChannelState::Disconnected) => "disconnected",
            SessionPhase::Channel(ChannelState::Connecting) => "connecting",
            SessionPhase::Channel(ChannelState::Connected) => "connected",
            SessionPhase::Channel(ChannelState::Closed) => "closed",
            SessionPhase::Poll(PollState::Idle) => "idle",
            SessionPhase::Poll(PollState::Polling) => "polling",
            SessionPhase::Poll(PollState::Stopped) => "stopped",
        }
    }
}

/// Clamps a progress fraction into `[0, 1]`; NaN becomes 0.
pub fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// State of one logical client.
///
/// Once `completed` is set, status, progress and result no longer change.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientState {
    /// 1-based, stable for the process lifetime.
    pub id: usize,
    pub mode: Mode,
    pub status: ClientStatus,
    pub progress: f64,
    pub result: ResultBuffer,
    pub status_metrics: Option<Value>,
    pub completed: bool,
    pub metrics: ClientMetrics,
    pub phase: SessionPhase,
    /// Units that could not be decoded (counted in `metrics`, otherwise dropped).
    pub decode_errors: u64,
    /// Cursor items rejected as duplicates or older than the cursor.
    pub rejected_items: u64,
}

impl ClientState {
    pub fn new(id: usize, mode: Mode) -> Self {
        Self {
            id,
            mode,
            status: ClientStatus::Idle,
            progress: 0.0,
            result: ResultBuffer::default(),
            status_metrics: None,
            completed: false,
            metrics: ClientMetrics::default(),
            phase: SessionPhase::initial(mode),
            decode_errors: 0,
            rejected_items: 0,
        }
    }

    /// Back to initial values, keeping `id` and `mode`.
    pub fn reset(&mut self) {
        *self = Self::new(self.id, self.mode);
    }

    /// Applies a status snapshot. Returns false once completed.
    ///
    /// A missing percentage is derived from `current / total` when both are known, else the
    /// previous progress stays.
    pub fn apply_status(&mut self, status: &TaskStatus) -> bool {
        if self.completed {
            return false;
        }
        let progress = &status.progress;
        let fraction = progress.percentage.or_else(|| match (progress.current, progress.total) {
            (Some(current), Some(total)) if total > 0 => Some(current as f64 / total as f64),
            _ => None,
        });
        if let Some(fraction) = fraction {
            self.progress = clamp_fraction(fraction);
        }
        self.status = ClientStatus::from_task_state(status.state);
        if status.metrics.is_some() {
            self.status_metrics = status.metrics.clone();
        }
        true
    }

    /// Marks the client completed with `status`. Only the first call has an effect.
    pub fn complete(&mut self, at: Duration, status: ClientStatus) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.status = status;
        self.metrics.mark_total(at);
        true
    }
}

/// Overall run status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Done,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        }
    }

    /// DONE or ERROR: nothing further happens in this run.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// All client states of a run plus the run-level status.
#[derive(Clone, Debug, PartialEq)]
pub struct RunState {
    pub task_id: Option<String>,
    pub status: RunStatus,
    pub error: Option<String>,
    /// Run number; events from an older generation are discarded.
    pub generation: u64,
    pub streaming: Vec<ClientState>,
    pub polling: Vec<ClientState>,
}

impl RunState {
    pub fn new(client_count: usize) -> Self {
        let clients = |mode| (1..=client_count).map(|id| ClientState::new(id, mode)).collect();
        Self {
            task_id: None,
            status: RunStatus::Idle,
            error: None,
            generation: 0,
            streaming: clients(Mode::Streaming),
            polling: clients(Mode::Polling),
        }
    }

    /// Clears run and client state for a new run; client identities stay.
    pub fn reset(&mut self, generation: u64) {
        self.task_id = None;
        self.status = RunStatus::Idle;
        self.error = None;
        self.generation = generation;
        for client in self.streaming.iter_mut().chain(self.polling.iter_mut()) {
            client.reset();
        }
    }

    pub fn clients(&self, mode: Mode) -> &[ClientState] {
        match mode {
            Mode::Streaming => &self.streaming,
            Mode::Polling => &self.polling,
        }
    }

    /// Client by 0-based index.
    pub fn client_mut(&mut self, mode: Mode, index: usize) -> Option<&mut ClientState> {
        match mode {
            Mode::Streaming => self.streaming.get_mut(index),
            Mode::Polling => self.polling.get_mut(index),
        }
    }

    pub fn client_count(&self) -> usize {
        self.streaming.len()
    }
}
