//! # pushpull
//!
//! Runs the same server-side task through two delivery mechanisms side by side, WebSocket
//! push and HTTP polling, and reconciles what each one delivers into comparable per-client
//! state: result text, progress, completion and timing/throughput metrics.
//!
//! ## Main modules
//!
//! - [`controller`]: [`RunController`] creates the task pair, fans out N streaming and N
//!   polling sessions, and tears them down on re-run.
//! - [`session`]: [`StreamingSession`] (push channel with keepalive) and [`PollingSession`]
//!   (fixed-interval pull loop with at most one round-trip pair in flight).
//! - [`reconcile`]: [`ResultReconciler`] merges append, snapshot and cursor updates
//!   idempotently.
//! - [`store`]: [`StateStore`], the single writer of [`RunState`]; publishes snapshots on
//!   the redraw cadence.
//! - [`aggregate`]: [`AggregateView`] per-mode summaries and the RUNNING to DONE re-check.
//! - [`transport`]: [`TransportClient`] / [`PushChannel`] seam and the reqwest +
//!   tokio-tungstenite [`HttpTransport`].
//! - [`state`], [`event`], [`task`], [`config`], [`error`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pushpull::{EngineConfig, HttpTransport, RunController, TaskSpec};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env();
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let mut controller = RunController::new(config, transport);
//! controller.run(TaskSpec::ComputePi { digits: 200 }).await?;
//! let state = controller.wait_until_settled().await;
//! println!("{}", state.status.as_str());
//! controller.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod session;
pub mod state;
pub mod store;
pub mod task;
pub mod transport;

pub use aggregate::{AggregateView, ModeSummary};
pub use config::EngineConfig;
pub use controller::{RunController, StartedTask};
pub use error::{EngineError, TransportError};
pub use event::{ClientEvent, ClientEventKind, ClientRef, StoreMessage};
pub use reconcile::{CursorItem, Fragment, MergeOutcome, ResultReconciler, ResultUpdate};
pub use session::{EventSink, PollingSession, SessionHandle, StreamingSession};
pub use state::{
    ChannelState, ClientMetrics, ClientState, ClientStatus, Mode, PollState, ResultBuffer,
    RunState, RunStatus, SessionPhase,
};
pub use store::{StateStore, StoreHandle};
pub use task::{parse_keywords, resolve_document_path, ResultShape, TaskEndpoints, TaskSpec};
pub use transport::{Frame, HttpResponse, HttpTransport, PushChannel, TransportClient};
