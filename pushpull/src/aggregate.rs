//! Per-mode summaries and the RUNNING to DONE transition.
//!
//! Completion is decided here, on the store's periodic re-check, never by a single session.

use std::time::Duration;

use crate::state::{ClientState, Mode, RunState, RunStatus};

#[derive(Clone, Debug, PartialEq)]
pub struct ModeSummary {
    pub mode: Mode,
    pub clients: usize,
    pub completed: usize,
    /// Fastest client's first update.
    pub first_update: Option<Duration>,
    /// Slowest client's total.
    pub total: Option<Duration>,
    pub units: u64,
    pub bytes: u64,
    /// Mean progress fraction across clients.
    pub progress: f64,
}

pub struct AggregateView;

impl AggregateView {
    pub fn summarize(mode: Mode, clients: &[ClientState]) -> ModeSummary {
        let first_update = clients.iter().filter_map(|c| c.metrics.first_update).min();
        let total = clients.iter().filter_map(|c| c.metrics.total).max();
        let progress = if clients.is_empty() {
            0.0
        } else {
            clients.iter().map(|c| c.progress).sum::<f64>() / clients.len() as f64
        };
        ModeSummary {
            mode,
            clients: clients.len(),
            completed: clients.iter().filter(|c| c.completed).count(),
            first_update,
            total,
            units: clients.iter().map(|c| c.metrics.units).sum(),
            bytes: clients.iter().map(|c| c.metrics.bytes).sum(),
            progress,
        }
    }

    pub fn summaries(run: &RunState) -> [ModeSummary; 2] {
        Mode::ALL.map(|mode| Self::summarize(mode, run.clients(mode)))
    }

    /// True when every client of both modes has completed.
    pub fn all_completed(run: &RunState) -> bool {
        Mode::ALL
            .iter()
            .all(|&mode| run.clients(mode).iter().all(|c| c.completed))
    }

    /// Moves a RUNNING run to DONE once all clients completed. Returns true on transition.
    pub fn recheck(run: &mut RunState) -> bool {
        if run.status == RunStatus::Running && Self::all_completed(run) {
            run.status = RunStatus::Done;
            return true;
        }
        false
    }
}
