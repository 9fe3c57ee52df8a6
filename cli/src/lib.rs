//! pushpull CLI library: run driver and report rendering used by the `pushpull` binary.

mod report;
mod run;

pub use report::{
    format_bytes, format_ms, format_sec, render_progress, render_report, results_agree,
    summary_json,
};
pub use run::{run_task, RunError, RunOptions};
