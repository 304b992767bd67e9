//! Task submission and polling handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use papertrail_common::{
    errors::Result,
    models::{Task, TaskStatus},
};
use papertrail_discovery::{ExpandRequest, SearchRequest};

/// Response after submitting a task
#[derive(Serialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub message: String,
    pub poll_url: String,
}

impl From<Task> for SubmitResponse {
    fn from(task: Task) -> Self {
        // Rejected submissions come back already failed
        let message = task
            .error
            .or(task.message)
            .unwrap_or_else(|| "Task queued".to_string());

        Self {
            task_id: task.id,
            status: task.status,
            message,
            poll_url: format!("/v1/tasks/{}", task.id),
        }
    }
}

#[derive(Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
}

/// Start a search task
pub async fn submit_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let task = state.service.submit_search(request)?;
    tracing::info!(task_id = %task.id, status = %task.status, "Search submitted");
    Ok((StatusCode::ACCEPTED, Json(task.into())))
}

/// Start a citation expansion task
pub async fn submit_expand(
    State(state): State<AppState>,
    Json(request): Json<ExpandRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let task = state.service.submit_expand(request)?;
    tracing::info!(task_id = %task.id, status = %task.status, "Expansion submitted");
    Ok((StatusCode::ACCEPTED, Json(task.into())))
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<TaskListResponse> {
    let tasks = state.service.list_tasks();
    Json(TaskListResponse {
        total: tasks.len(),
        tasks,
    })
}

pub async fn get_task(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> Result<Json<Task>> {
    Ok(Json(state.service.get_task(task_id)?))
}

pub async fn delete_task(State(state): State<AppState>, Path(task_id): Path<Uuid>) -> Result<StatusCode> {
    state.service.delete_task(task_id)?;
    Ok(StatusCode::NO_CONTENT)
}
