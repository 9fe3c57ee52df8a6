//! Per-client sessions: one push subscription or one polling loop each.

pub mod polling;
pub mod streaming;

pub use polling::PollingSession;
pub use streaming::StreamingSession;

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::event::{ClientEvent, ClientEventKind, ClientRef, StoreMessage};

/// Sends one client's events to the store, stamped with time since session start.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StoreMessage>,
    client: ClientRef,
    started: Instant,
}

impl EventSink {
    /// Starts the session clock now.
    pub fn new(tx: mpsc::Sender<StoreMessage>, client: ClientRef) -> Self {
        Self {
            tx,
            client,
            started: Instant::now(),
        }
    }

    pub fn client(&self) -> ClientRef {
        self.client
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns false when the store is gone.
    pub async fn emit(&self, kind: ClientEventKind) -> bool {
        let event = ClientEvent {
            client: self.client,
            elapsed: self.elapsed(),
            kind,
        };
        self.tx.send(StoreMessage::Client(event)).await.is_ok()
    }
}

/// A spawned session. [`stop`](SessionHandle::stop) cancels it and waits for it to exit.
pub struct SessionHandle {
    client: ClientRef,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn spawn<F>(client: ClientRef, cancel: CancellationToken, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            client,
            cancel,
            join: Some(tokio::spawn(fut)),
        }
    }

    pub fn client(&self) -> ClientRef {
        self.client
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Idempotent; safe while a round-trip is in flight.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                warn!(mode = %self.client.mode, index = self.client.index, error = %e, "session task failed");
            }
        }
    }
}
