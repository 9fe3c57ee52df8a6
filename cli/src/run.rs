//! Drives one run: start, print progress on the redraw cadence, wait for DONE or ERROR.

use std::sync::Arc;
use std::time::Duration;

use pushpull::{EngineConfig, HttpTransport, RunController, RunState, RunStatus, TaskSpec};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::report::render_progress;

/// Options for [`run_task`].
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub task: TaskSpec,
    pub config: EngineConfig,
    /// Suppress live progress lines (the caller prints JSON at the end).
    pub quiet: bool,
    /// Give up after this long; `None` waits until the run settles.
    pub timeout: Option<Duration>,
}

/// Error from [`run_task`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Engine(#[from] pushpull::EngineError),
    #[error("run did not finish within {0:?}")]
    TimedOut(Duration, Box<RunState>),
    #[error("run failed: {0}")]
    Failed(String, Box<RunState>),
}

/// Starts the task, prints one progress line per redraw when it changed, and returns the
/// settled state once every session has stopped.
pub async fn run_task(opts: RunOptions) -> Result<RunState, RunError> {
    let redraw = opts.config.redraw_interval;
    let transport = Arc::new(HttpTransport::new(&opts.config).map_err(pushpull::EngineError::from)?);
    let mut controller = RunController::new(opts.config, transport);

    let started = match controller.run(opts.task).await {
        Ok(started) => started,
        Err(e) => {
            controller.shutdown().await;
            return Err(e.into());
        }
    };
    info!(task_id = %started.task_id, poll_task_id = %started.poll_task_id, "task pair created");

    let settled = {
        let settled = controller.wait_until_settled();
        tokio::pin!(settled);
        let deadline = async {
            match opts.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(redraw);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_line = String::new();
        loop {
            tokio::select! {
                state = &mut settled => break Some(state),
                _ = &mut deadline => break None,
                _ = ticker.tick() => {
                    if opts.quiet {
                        continue;
                    }
                    let line = render_progress(&controller.snapshot());
                    if line != last_line {
                        eprintln!("{}", line);
                        last_line = line;
                    }
                }
            }
        }
    };

    let final_state = controller.shutdown().await;
    match settled {
        None => {
            let limit = opts.timeout.unwrap_or_default();
            warn!(?limit, "run timed out");
            Err(RunError::TimedOut(limit, Box::new(final_state)))
        }
        Some(state) if state.status == RunStatus::Error => Err(RunError::Failed(
            state.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            Box::new(state),
        )),
        Some(_) => Ok(final_state),
    }
}
