//! HTTP handlers: task creation and the naive polling endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use task_event::{
    ComputePiRequest, CreateTaskResponse, DocumentAnalysisRequest, NaiveComputePiRequest,
    NaiveDocumentAnalysisRequest, NaiveTaskResponse, ResultResponse, SnippetsResponse,
    TaskStatus,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::response::ApiError;
use crate::script::{Task, TaskScript};

#[derive(Debug, Deserialize)]
pub(crate) struct TaskQuery {
    task_id: String,
    #[serde(default)]
    after: Option<u64>,
}

fn pi_script(state: &AppState, digits: u32) -> Result<TaskScript, ApiError> {
    let digits = digits as usize;
    if digits == 0 || digits > state.config.max_digits {
        return Err(ApiError::Invalid(format!(
            "digits must be between 1 and {}",
            state.config.max_digits
        )));
    }
    Ok(TaskScript::pi(digits, state.config.chunk_size))
}

fn document_script(
    state: &AppState,
    req: &DocumentAnalysisRequest,
) -> Result<TaskScript, ApiError> {
    if req.document_path.trim().is_empty() {
        return Err(ApiError::Invalid("document_path is required".into()));
    }
    let keywords: Vec<String> = req
        .keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return Err(ApiError::Invalid("keywords are required".into()));
    }
    Ok(TaskScript::document(
        &req.document_path,
        &keywords,
        state.config.snippets_per_keyword,
    ))
}

fn naive_id(task_id: &str) -> String {
    if task_id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        task_id.to_string()
    }
}

fn naive_task(state: &AppState, task_id: &str) -> Result<Arc<Task>, ApiError> {
    AppState::get(&state.naive_tasks, task_id)
        .ok_or_else(|| ApiError::NotFound(format!("task {} not found", task_id)))
}

pub(crate) async fn create_pi(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ComputePiRequest>,
) -> Result<Json<CreateTaskResponse>, ApiError> {
    let script = pi_script(&state, req.n)?;
    let id = Uuid::new_v4().to_string();
    info!(task_id = %id, digits = req.n, "push task created");
    AppState::insert(&state.push_tasks, id.clone(), Task::new(script, state.config.step_interval));
    Ok(Json(CreateTaskResponse { id }))
}

pub(crate) async fn create_naive_pi(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NaiveComputePiRequest>,
) -> Result<Json<NaiveTaskResponse>, ApiError> {
    let script = pi_script(&state, req.digits)?;
    let task_id = naive_id(&req.task_id);
    info!(task_id = %task_id, digits = req.digits, "naive task created");
    AppState::insert(
        &state.naive_tasks,
        task_id.clone(),
        Task::new(script, state.config.step_interval),
    );
    Ok(Json(NaiveTaskResponse { task_id }))
}

pub(crate) async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DocumentAnalysisRequest>,
) -> Result<Json<CreateTaskResponse>, ApiError> {
    let script = document_script(&state, &req)?;
    let id = Uuid::new_v4().to_string();
    info!(task_id = %id, path = %req.document_path, "push document task created");
    AppState::insert(&state.push_tasks, id.clone(), Task::new(script, state.config.step_interval));
    Ok(Json(CreateTaskResponse { id }))
}

pub(crate) async fn create_naive_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NaiveDocumentAnalysisRequest>,
) -> Result<Json<NaiveTaskResponse>, ApiError> {
    let script = document_script(&state, &req.request)?;
    let task_id = naive_id(&req.task_id);
    info!(task_id = %task_id, path = %req.request.document_path, "naive document task created");
    AppState::insert(
        &state.naive_tasks,
        task_id.clone(),
        Task::new(script, state.config.step_interval),
    );
    Ok(Json(NaiveTaskResponse { task_id }))
}

/// `GET /naive/check_progress` and `GET /naive/document-analysis/status`.
pub(crate) async fn naive_progress(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<TaskStatus>, ApiError> {
    Ok(Json(naive_task(&state, &q.task_id)?.status()))
}

/// `GET /naive/task_result`: the whole result so far.
pub(crate) async fn naive_result(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<ResultResponse>, ApiError> {
    let task = naive_task(&state, &q.task_id)?;
    let step = task.step();
    Ok(Json(ResultResponse {
        partial_result: task.script.partial_result(step).into(),
        done: step >= task.script.total(),
    }))
}

/// `GET /naive/document-analysis/snippets`: snippets after the `after` cursor.
pub(crate) async fn naive_snippets(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<SnippetsResponse>, ApiError> {
    let task = naive_task(&state, &q.task_id)?;
    if !task.script.is_document() {
        return Err(ApiError::Invalid(format!(
            "task {} is not a document task",
            q.task_id
        )));
    }
    Ok(Json(task.script.snippets_after(q.after, task.step())))
}
