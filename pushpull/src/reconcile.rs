//! Merging of result updates into a client's [`ResultBuffer`](crate::state::ResultBuffer).
//!
//! Three update shapes arrive for the same logical result:
//!
//! - **Append** (push chunks): new fragments only, concatenated in arrival order.
//! - **Snapshot** (cumulative poll): the whole result so far, compared with what is buffered.
//! - **Cursor** (paged poll): items after the last seen id, deduplicated by id.
//!
//! Every merge is idempotent with respect to content already buffered, and a completed
//! client is never modified. The returned [`MergeOutcome`] tells a renderer whether it can
//! append a delta or must redraw.

use serde_json::Value;
use task_event::Snippet;

use crate::state::ClientState;

/// One unit of appended content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// Raw text, concatenated as-is (digits).
    Text(String),
    /// A display line, separated from previous content by `\n` (snippets).
    Line(String),
}

/// One item of a cursor page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorItem {
    pub id: Option<u64>,
    pub line: String,
}

impl From<&Snippet> for CursorItem {
    fn from(s: &Snippet) -> Self {
        CursorItem {
            id: s.id,
            line: s.display_line(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultUpdate {
    Append(Vec<Fragment>),
    Snapshot(String),
    Cursor {
        items: Vec<CursorItem>,
        last_id: Option<u64>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Unchanged,
    /// Only this text was added at the end.
    Appended(String),
    /// The buffer was rewritten; render from scratch.
    Replaced,
}

/// Converts one pushed chunk item to a fragment. Objects are snippets; null is skipped.
pub fn fragment_from_value(value: &Value) -> Option<Fragment> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Fragment::Text(s.clone())),
        Value::Object(_) => {
            let snippet: Snippet = serde_json::from_value(value.clone()).unwrap_or_default();
            Some(Fragment::Line(snippet.display_line()))
        }
        other => Some(Fragment::Text(other.to_string())),
    }
}

pub struct ResultReconciler;

impl ResultReconciler {
    pub fn merge(client: &mut ClientState, update: ResultUpdate) -> MergeOutcome {
        if client.completed {
            return MergeOutcome::Unchanged;
        }
        match update {
            ResultUpdate::Append(fragments) => Self::append(client, fragments),
            ResultUpdate::Snapshot(text) => Self::snapshot(client, text),
            ResultUpdate::Cursor { items, last_id } => Self::cursor(client, items, last_id),
        }
    }

    fn append(client: &mut ClientState, fragments: Vec<Fragment>) -> MergeOutcome {
        let buf = &mut client.result;
        let start = buf.text.len();
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => buf.text.push_str(&text),
                Fragment::Line(line) => push_line(&mut buf.text, &line),
            }
        }
        finish_append(buf, start)
    }

    fn snapshot(client: &mut ClientState, incoming: String) -> MergeOutcome {
        let buf = &mut client.result;
        if incoming == buf.text {
            return MergeOutcome::Unchanged;
        }
        if !buf.text.is_empty() && incoming.len() > buf.text.len() && incoming.starts_with(&buf.text)
        {
            if let Some(delta) = incoming.get(buf.rendered_len..).map(str::to_string) {
                buf.text = incoming;
                buf.rendered_len = buf.text.len();
                return if delta.is_empty() {
                    MergeOutcome::Unchanged
                } else {
                    MergeOutcome::Appended(delta)
                };
            }
        }
        if !buf.text.is_empty() && incoming.len() < buf.text.len() {
            tracing::debug!(
                client = client.id,
                mode = %client.mode,
                from = buf.text.len(),
                to = incoming.len(),
                "snapshot shorter than buffer, replacing"
            );
        }
        // Empty buffer, truncation or diverged content.
        buf.text = incoming;
        buf.rendered_len = buf.text.len();
        MergeOutcome::Replaced
    }

    fn cursor(
        client: &mut ClientState,
        items: Vec<CursorItem>,
        last_id: Option<u64>,
    ) -> MergeOutcome {
        let start = client.result.text.len();
        for item in items {
            if let Some(id) = item.id {
                if client.result.last_seen_id.is_some_and(|seen| id <= seen) {
                    client.rejected_items += 1;
                    tracing::debug!(
                        client = client.id,
                        mode = %client.mode,
                        id,
                        last_seen = ?client.result.last_seen_id,
                        "cursor item at or below last seen id, skipped"
                    );
                    continue;
                }
                client.result.last_seen_id = Some(id);
            }
            push_line(&mut client.result.text, &item.line);
        }
        if let Some(page_last) = last_id {
            let seen = client.result.last_seen_id.map_or(page_last, |s| s.max(page_last));
            client.result.last_seen_id = Some(seen);
        }
        finish_append(&mut client.result, start)
    }
}

fn push_line(text: &mut String, line: &str) {
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(line);
}

fn finish_append(buf: &mut crate::state::ResultBuffer, start: usize) -> MergeOutcome {
    let delta = buf.text[start..].to_string();
    buf.rendered_len = buf.text.len();
    if delta.is_empty() {
        MergeOutcome::Unchanged
    } else {
        MergeOutcome::Appended(delta)
    }
}
