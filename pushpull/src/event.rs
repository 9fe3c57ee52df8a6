//! Messages from sessions and the controller to the state store.

use std::time::Duration;

use task_event::TaskStatus;

use crate::reconcile::ResultUpdate;
use crate::state::{ClientStatus, Mode, SessionPhase};

/// Addresses one client of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientRef {
    pub generation: u64,
    pub mode: Mode,
    /// 0-based index into the mode's clients.
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClientEventKind {
    /// An inbound unit (frame or response body) of this many bytes.
    Received { bytes: u64 },
    /// An inbound unit failed to decode; already counted by `Received`.
    DecodeFailed,
    Status(TaskStatus),
    /// The session saw its first genuine update.
    FirstUpdate,
    Result(ResultUpdate),
    /// Terminal condition; the client finishes with this status.
    Completed(ClientStatus),
    Phase(SessionPhase),
}

/// A change to one client, stamped with time since its session started.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientEvent {
    pub client: ClientRef,
    pub elapsed: Duration,
    pub kind: ClientEventKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StoreMessage {
    /// New run: clear state and adopt the generation.
    Reset { generation: u64 },
    Starting { generation: u64 },
    Started { generation: u64, task_id: String },
    Failed { generation: u64, error: String },
    Client(ClientEvent),
}
