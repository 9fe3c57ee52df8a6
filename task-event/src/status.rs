//! Task status snapshot: `{ state, progress: { current, total, percentage }, metrics }`.
//!
//! Pushed inside `task.status` frames and returned as-is by the naive progress endpoint.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Coarse task state reported by the backend.
///
/// Serialized as the upper-case state name. Unrecognised names decode as [`TaskState::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" | "PENDING" => Self::Queued,
            "RUNNING" | "STARTED" => Self::Running,
            "COMPLETED" | "SUCCESS" => Self::Completed,
            "FAILED" | "FAILURE" => Self::Failed,
            "CANCELLED" | "REVOKED" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    /// True for states that end the task without a result.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

impl Serialize for TaskState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Progress counters; `percentage` is a fraction in `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// One status snapshot. `metrics` is opaque and passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    #[serde(default)]
    pub progress: TaskProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_state_string_decodes_as_unknown() {
        let status: TaskStatus =
            serde_json::from_value(json!({"state":"SENT","progress":{}})).unwrap();
        assert_eq!(status.state, Some(TaskState::Unknown));
    }

    #[test]
    fn missing_fields_default() {
        let status: TaskStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(status.state, None);
        assert_eq!(status.progress, TaskProgress::default());
        assert!(status.metrics.is_none());
    }

    #[test]
    fn celery_state_names_map_onto_task_states() {
        assert_eq!(TaskState::parse("PENDING"), TaskState::Queued);
        assert_eq!(TaskState::parse("success"), TaskState::Completed);
        assert_eq!(TaskState::parse("REVOKED"), TaskState::Cancelled);
    }

    #[test]
    fn failure_states() {
        assert!(TaskState::Failed.is_failure());
        assert!(TaskState::Cancelled.is_failure());
        assert!(!TaskState::Completed.is_failure());
        assert!(!TaskState::Running.is_failure());
        assert!(!TaskState::Unknown.is_failure());
    }
}
