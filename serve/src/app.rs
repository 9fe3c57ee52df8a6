//! Axum app: backend config, shared state, and router.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};

use crate::connection::ws_handler;
use crate::script::Task;
use crate::tasks::{
    create_document, create_naive_document, create_naive_pi, create_pi, naive_progress,
    naive_result, naive_snippets,
};

/// Pacing and limits of the scripted tasks.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    /// Time per released item.
    pub step_interval: Duration,
    /// Largest accepted digit count for the compute task.
    pub max_digits: usize,
    /// Characters released per step by the compute task.
    pub chunk_size: usize,
    /// Snippets generated per keyword by the document task.
    pub snippets_per_keyword: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            step_interval: Duration::from_millis(50),
            max_digits: 1000,
            chunk_size: 5,
            snippets_per_keyword: 3,
        }
    }
}

/// Builds BackendConfig from environment variables, falling back to [`Default`] for unset or invalid values.
///
/// - `SERVE_STEP_INTERVAL_MS` (default 50)
/// - `SERVE_MAX_DIGITS` (default 1000)
/// - `SERVE_CHUNK_SIZE` (default 5)
/// - `SERVE_SNIPPETS_PER_KEYWORD` (default 3)
pub fn backend_config_from_env() -> BackendConfig {
    let default = BackendConfig::default();
    BackendConfig {
        step_interval: std::env::var("SERVE_STEP_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms: &u64| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(default.step_interval),
        max_digits: std::env::var("SERVE_MAX_DIGITS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.max_digits),
        chunk_size: std::env::var("SERVE_CHUNK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(default.chunk_size),
        snippets_per_keyword: std::env::var("SERVE_SNIPPETS_PER_KEYWORD")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(default.snippets_per_keyword),
    }
}

/// Shared state: push tasks and their naive twins, keyed by task id.
pub(crate) struct AppState {
    pub(crate) config: BackendConfig,
    pub(crate) push_tasks: Mutex<HashMap<String, Arc<Task>>>,
    pub(crate) naive_tasks: Mutex<HashMap<String, Arc<Task>>>,
}

impl AppState {
    pub(crate) fn new(config: BackendConfig) -> Self {
        Self {
            config,
            push_tasks: Mutex::new(HashMap::new()),
            naive_tasks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(tasks: &Mutex<HashMap<String, Arc<Task>>>, id: String, task: Task) {
        tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(task));
    }

    pub(crate) fn get(tasks: &Mutex<HashMap<String, Arc<Task>>>, id: &str) -> Option<Arc<Task>> {
        tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

/// Routes: task creation and naive polling under `/api`, push channel at `/ws/tasks/:task_id`.
pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/calculate_pi", post(create_pi))
        .route("/api/naive/calculate_pi", post(create_naive_pi))
        .route("/api/naive/check_progress", get(naive_progress))
        .route("/api/naive/task_result", get(naive_result))
        .route("/api/tasks/document-analysis", post(create_document))
        .route("/api/naive/document-analysis", post(create_naive_document))
        .route("/api/naive/document-analysis/status", get(naive_progress))
        .route("/api/naive/document-analysis/snippets", get(naive_snippets))
        .route("/ws/tasks/:task_id", get(ws_handler))
        .with_state(state)
}
