//! Deterministic task scripts: what a task produces and when.
//!
//! A task advances one step per `step_interval` from its creation; each step releases one
//! item. Both transports read the same script, so a push subscriber and a poller of the same
//! task end with identical results.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use task_event::{Snippet, SnippetLocation, SnippetsResponse, TaskProgress, TaskState, TaskStatus};

use crate::pi::PI_DECIMALS;

#[derive(Debug, PartialEq)]
pub(crate) enum TaskScript {
    /// `"3."` plus the decimals, released `chunk_size` characters per step.
    Pi { pieces: Vec<String> },
    /// Keyword hits, one per step. Ids start at 1.
    Document { snippets: Vec<Snippet> },
}

impl TaskScript {
    pub(crate) fn pi(digits: usize, chunk_size: usize) -> Self {
        let text = format!("3.{}", &PI_DECIMALS[..digits.min(PI_DECIMALS.len())]);
        let chars: Vec<char> = text.chars().collect();
        let pieces = chars
            .chunks(chunk_size.max(1))
            .map(|c| c.iter().collect())
            .collect();
        TaskScript::Pi { pieces }
    }

    pub(crate) fn document(document_path: &str, keywords: &[String], per_keyword: usize) -> Self {
        let name = document_path.rsplit('/').next().unwrap_or(document_path);
        let count = keywords.len() * per_keyword;
        let snippets = (0..count)
            .map(|i| {
                let keyword = &keywords[i % keywords.len()];
                Snippet {
                    id: Some(i as u64 + 1),
                    line: Some(7 + 13 * i as u64),
                    keyword: Some(keyword.clone()),
                    snippet: Some(format!(
                        "...and the {} turned up again in {} (hit {})...",
                        keyword,
                        name,
                        i / keywords.len() + 1
                    )),
                    location: None,
                }
            })
            .collect();
        TaskScript::Document { snippets }
    }

    pub(crate) fn total(&self) -> usize {
        match self {
            TaskScript::Pi { pieces } => pieces.len(),
            TaskScript::Document { snippets } => snippets.len(),
        }
    }

    pub(crate) fn status(&self, step: usize, elapsed: Duration) -> TaskStatus {
        let total = self.total();
        let step = step.min(total);
        let state = if step >= total {
            TaskState::Completed
        } else {
            TaskState::Running
        };
        TaskStatus {
            state: Some(state),
            progress: TaskProgress {
                current: Some(step as u64),
                total: Some(total as u64),
                percentage: Some(if total == 0 { 1.0 } else { step as f64 / total as f64 }),
                phase: Some(self.phase().to_string()),
            },
            metrics: Some(json!({
                "elapsed_ms": elapsed.as_millis() as u64,
                "items": step,
            })),
            reason: None,
        }
    }

    fn phase(&self) -> &'static str {
        match self {
            TaskScript::Pi { .. } => "computing",
            TaskScript::Document { .. } => "scanning",
        }
    }

    /// Items released by steps `from..to`, as pushed in `task.result_chunk` data.
    pub(crate) fn chunk_items(&self, from: usize, to: usize) -> Vec<Value> {
        match self {
            TaskScript::Pi { pieces } => pieces[from..to.min(pieces.len())]
                .iter()
                .map(|p| Value::String(p.clone()))
                .collect(),
            TaskScript::Document { snippets } => snippets[from..to.min(snippets.len())]
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "keyword": s.keyword,
                        "snippet": s.snippet,
                        "location": SnippetLocation { line: s.line },
                    })
                })
                .collect(),
        }
    }

    /// Cumulative text after `step` steps.
    pub(crate) fn partial_result(&self, step: usize) -> String {
        match self {
            TaskScript::Pi { pieces } => pieces[..step.min(pieces.len())].concat(),
            TaskScript::Document { snippets } => snippets[..step.min(snippets.len())]
                .iter()
                .map(Snippet::display_line)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Snippets released by `step` with an id above `after`.
    pub(crate) fn snippets_after(&self, after: Option<u64>, step: usize) -> SnippetsResponse {
        let TaskScript::Document { snippets } = self else {
            return SnippetsResponse::default();
        };
        let page: Vec<Snippet> = snippets[..step.min(snippets.len())]
            .iter()
            .filter(|s| match (s.id, after) {
                (Some(id), Some(after)) => id > after,
                _ => true,
            })
            .cloned()
            .collect();
        let last_id = page.iter().filter_map(|s| s.id).max().or(after);
        SnippetsResponse {
            snippets: page,
            last_id,
        }
    }

    /// Payload of the final `task.result` frame.
    pub(crate) fn final_payload(&self) -> Value {
        match self {
            TaskScript::Pi { .. } => json!({ "result": self.partial_result(self.total()) }),
            TaskScript::Document { snippets } => json!({ "snippet_count": snippets.len() }),
        }
    }

    pub(crate) fn is_document(&self) -> bool {
        matches!(self, TaskScript::Document { .. })
    }
}

/// A script anchored at its creation time.
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) script: TaskScript,
    pub(crate) created: Instant,
    pub(crate) step_interval: Duration,
}

impl Task {
    /// A zero `step_interval` is raised to 1 ms; the push ticker cannot run on zero.
    pub(crate) fn new(script: TaskScript, step_interval: Duration) -> Self {
        Self {
            script,
            created: Instant::now(),
            step_interval: step_interval.max(Duration::from_millis(1)),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }

    /// Steps completed so far, capped at the script length.
    pub(crate) fn step(&self) -> usize {
        let steps = self.elapsed().as_micros() / self.step_interval.as_micros();
        usize::try_from(steps)
            .unwrap_or(usize::MAX)
            .min(self.script.total())
    }

    pub(crate) fn status(&self) -> TaskStatus {
        self.script.status(self.step(), self.elapsed())
    }
}
