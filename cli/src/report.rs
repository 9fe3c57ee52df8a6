//! Text and JSON rendering of run snapshots.
//!
//! One progress line per redraw while running, then a per-mode and per-client report.

use std::time::Duration;

use pushpull::{AggregateView, ClientState, Mode, ModeSummary, RunState};
use serde_json::{json, Value};

/// Milliseconds, or `-` when not yet measured.
pub fn format_ms(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{} ms", d.as_millis()),
        None => "-".to_string(),
    }
}

/// Seconds with two decimals, or `-` when not yet measured.
pub fn format_sec(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.2} s", d.as_secs_f64()),
        None => "-".to_string(),
    }
}

/// `N B` below 1 KB, `x.x KB` below 1 MB, else `x.xx MB`.
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.2} MB", b / MB)
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

/// One-line live summary: `[RUNNING] streaming 3/5 62% 1.2 KB | polling 1/5 40% 4.1 KB`.
pub fn render_progress(state: &RunState) -> String {
    let parts: Vec<String> = AggregateView::summaries(state)
        .iter()
        .map(|s| {
            format!(
                "{} {}/{} {} {}",
                s.mode,
                s.completed,
                s.clients,
                percent(s.progress),
                format_bytes(s.bytes)
            )
        })
        .collect();
    format!("[{}] {}", state.status.as_str(), parts.join(" | "))
}

fn render_mode(summary: &ModeSummary) -> String {
    format!(
        "{:<9}  completed {}/{}  first {}  total {}  messages {}  bytes {}",
        summary.mode.as_str(),
        summary.completed,
        summary.clients,
        format_ms(summary.first_update),
        format_sec(summary.total),
        summary.units,
        format_bytes(summary.bytes)
    )
}

fn render_client(client: &ClientState) -> String {
    let mut line = format!(
        "  #{:<3} {:<9} {:>4}  first {}  total {}  msgs {}  bytes {}  result {} chars",
        client.id,
        client.status.as_str(),
        percent(client.progress),
        format_ms(client.metrics.first_update),
        format_sec(client.metrics.total),
        client.metrics.units,
        format_bytes(client.metrics.bytes),
        client.result.text().chars().count()
    );
    if client.decode_errors > 0 {
        line.push_str(&format!("  decode errors {}", client.decode_errors));
    }
    if client.rejected_items > 0 {
        line.push_str(&format!("  rejected {}", client.rejected_items));
    }
    line
}

/// True when every client of both modes ended with the same result text.
pub fn results_agree(state: &RunState) -> bool {
    let mut texts = Mode::ALL
        .iter()
        .flat_map(|&mode| state.clients(mode))
        .map(|c| c.result.text());
    match texts.next() {
        Some(first) => texts.all(|t| t == first),
        None => true,
    }
}

/// Multi-line final report.
pub fn render_report(state: &RunState) -> String {
    let mut lines = vec![format!(
        "run {}  task {}",
        state.status.as_str(),
        state.task_id.as_deref().unwrap_or("-")
    )];
    if let Some(err) = &state.error {
        lines.push(format!("error: {}", err));
    }
    for summary in AggregateView::summaries(state) {
        lines.push(render_mode(&summary));
        for client in state.clients(summary.mode) {
            lines.push(render_client(client));
        }
    }
    lines.push(format!(
        "results agree: {}",
        if results_agree(state) { "yes" } else { "no" }
    ));
    lines.join("\n")
}

fn millis(d: Option<Duration>) -> Value {
    d.map(|d| json!(d.as_millis() as u64)).unwrap_or(Value::Null)
}

fn client_json(client: &ClientState) -> Value {
    json!({
        "id": client.id,
        "status": client.status.as_str(),
        "progress": client.progress,
        "completed": client.completed,
        "first_update_ms": millis(client.metrics.first_update),
        "total_ms": millis(client.metrics.total),
        "messages": client.metrics.units,
        "bytes": client.metrics.bytes,
        "decode_errors": client.decode_errors,
        "rejected_items": client.rejected_items,
        "result": client.result.text(),
    })
}

/// Final report as JSON: run status, per-mode summaries, per-client states.
pub fn summary_json(state: &RunState) -> Value {
    let modes: serde_json::Map<String, Value> = AggregateView::summaries(state)
        .iter()
        .map(|s| {
            let value = json!({
                "clients": s.clients,
                "completed": s.completed,
                "first_update_ms": millis(s.first_update),
                "total_ms": millis(s.total),
                "messages": s.units,
                "bytes": s.bytes,
                "progress": s.progress,
                "client_states": state
                    .clients(s.mode)
                    .iter()
                    .map(client_json)
                    .collect::<Vec<_>>(),
            });
            (s.mode.as_str().to_string(), value)
        })
        .collect();
    json!({
        "status": state.status.as_str(),
        "task_id": state.task_id,
        "error": state.error,
        "generation": state.generation,
        "results_agree": results_agree(state),
        "modes": modes,
    })
}
