//! Asynchronous task registry
//!
//! Process-wide lifecycle tracking for discovery jobs. Readers get whole
//! point-in-time snapshots: every update builds a new `Task` and swaps the
//! `Arc` under a short write lock, so a poller never sees a half-applied
//! update.

use chrono::Utc;
use papertrail_common::errors::{AppError, Result};
use papertrail_common::metrics;
use papertrail_common::models::{Task, TaskKind, TaskResult, TaskStatus};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// A single mutation applied by the worker owning a task
#[derive(Debug, Clone)]
pub enum TaskUpdate {
    /// Move to `processing`
    Start { message: String },

    /// Report progress; values below the current progress are ignored
    Progress { progress: f64, message: Option<String> },

    /// Finish with a result
    Complete(TaskResult),

    /// Finish with an error message
    Fail(String),
}

impl TaskUpdate {
    fn target_status(&self) -> TaskStatus {
        match self {
            TaskUpdate::Start { .. } | TaskUpdate::Progress { .. } => TaskStatus::Processing,
            TaskUpdate::Complete(_) => TaskStatus::Completed,
            TaskUpdate::Fail(_) => TaskStatus::Failed,
        }
    }
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<Uuid, Arc<Task>>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queued task and return the handle its worker will own
    pub fn submit(&self, kind: TaskKind, input: serde_json::Value) -> TaskHandle {
        let task = Task::queued(kind, input);
        let id = task.id;

        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(task));

        metrics::record_task_submitted(kind.as_str());
        debug!(task_id = %id, kind = %kind, "Task queued");

        TaskHandle {
            id,
            registry: self.clone(),
        }
    }

    /// Snapshot of one task
    pub fn get(&self, id: Uuid) -> Result<Task> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|task| Task::clone(task))
            .ok_or_else(|| AppError::TaskNotFound { id: id.to_string() })
    }

    /// Snapshots of every task, oldest first
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|task| Task::clone(task))
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        tasks
    }

    /// Apply `update` atomically and return the new snapshot.
    ///
    /// Illegal lifecycle moves leave the task untouched.
    pub fn update(&self, id: Uuid, update: TaskUpdate) -> Result<Task> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let current = tasks
            .get(&id)
            .ok_or_else(|| AppError::TaskNotFound { id: id.to_string() })?;

        let target = update.target_status();
        if !current.status.can_transition_to(target) {
            return Err(AppError::InvalidTransition {
                from: current.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = Utc::now();
        let mut next = Task::clone(current);
        next.status = target;
        next.updated_at = now;
        if next.started_at.is_none() && target != TaskStatus::Failed {
            next.started_at = Some(now);
        }

        match update {
            TaskUpdate::Start { message } => {
                next.message = Some(message);
            }
            TaskUpdate::Progress { progress, message } => {
                next.progress = next.progress.max(clamp_progress(progress));
                if message.is_some() {
                    next.message = message;
                }
            }
            TaskUpdate::Complete(result) => {
                next.progress = 1.0;
                next.result = Some(result);
                next.message = Some("Task completed".to_string());
                next.finished_at = Some(now);
            }
            TaskUpdate::Fail(error) => {
                next.message = Some("Task failed".to_string());
                next.error = Some(error);
                next.finished_at = Some(now);
            }
        }

        if next.is_terminal() {
            let duration = next
                .started_at
                .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);
            metrics::record_task_finished(next.kind.as_str(), next.status.as_str(), duration);
            info!(
                task_id = %id,
                kind = %next.kind,
                status = %next.status,
                error = next.error.as_deref().unwrap_or(""),
                "Task finished"
            );
        }

        let snapshot = Arc::new(next);
        tasks.insert(id, snapshot.clone());
        Ok(Task::clone(&snapshot))
    }

    /// Remove a task; unknown or already deleted ids are `TaskNotFound`
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let removed = self
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or_else(|| AppError::TaskNotFound { id: id.to_string() })?;

        if !removed.is_terminal() {
            metrics::record_task_finished(removed.kind.as_str(), "deleted", None);
        }
        info!(task_id = %id, "Task deleted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// The owning worker's handle on one task
#[derive(Clone)]
pub struct TaskHandle {
    id: Uuid,
    registry: TaskRegistry,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> Result<Task> {
        self.registry.get(self.id)
    }

    pub fn start(&self, message: impl Into<String>) -> Result<Task> {
        self.registry.update(
            self.id,
            TaskUpdate::Start {
                message: message.into(),
            },
        )
    }

    pub fn progress(&self, progress: f64, message: impl Into<String>) -> Result<Task> {
        self.registry.update(
            self.id,
            TaskUpdate::Progress {
                progress,
                message: Some(message.into()),
            },
        )
    }

    pub fn complete(&self, result: TaskResult) -> Result<Task> {
        self.registry.update(self.id, TaskUpdate::Complete(result))
    }

    pub fn fail(&self, error: impl Into<String>) -> Result<Task> {
        self.registry.update(self.id, TaskUpdate::Fail(error.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papertrail_common::models::SearchOutcome;
    use serde_json::json;

    #[test]
    fn test_submit_then_get() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Search, json!({"query": "gnn"}));

        let task = registry.get(handle.id()).unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.progress, 0.0);
        assert_eq!(task.input["query"], "gnn");
        assert!(task.result.is_none());
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Expand, json!({}));
        handle.start("Resolving seeds").unwrap();

        let mut observed = vec![];
        for p in [0.1, 0.4, 0.3, 2.0, f64::NAN, 0.5] {
            observed.push(handle.progress(p, "working").unwrap().progress);
        }
        assert_eq!(observed, vec![0.1, 0.4, 0.4, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Search, json!({}));
        handle.start("go").unwrap();
        let done = handle.complete(TaskResult::Search(SearchOutcome::default())).unwrap();
        assert_eq!(done.progress, 1.0);
        assert!(done.finished_at.is_some());

        let err = handle.fail("late failure").unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        let err = handle.progress(0.2, "late progress").unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let task = handle.snapshot().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error.is_none());
    }

    #[test]
    fn test_queued_task_can_fail_without_starting() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Expand, json!({"seed_ids": []}));

        let task = handle.fail("Invalid input: at least one seed is required").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.started_at.is_none());
        assert!(handle.complete(TaskResult::Expand(Default::default())).is_err());
    }

    #[test]
    fn test_queued_task_cannot_complete_directly() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Search, json!({}));
        assert!(handle.complete(TaskResult::Search(SearchOutcome::default())).is_err());
        assert_eq!(handle.snapshot().unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn test_delete_twice_is_not_found() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Search, json!({}));

        registry.delete(handle.id()).unwrap();
        assert!(matches!(registry.delete(handle.id()), Err(AppError::TaskNotFound { .. })));
        assert!(matches!(registry.get(handle.id()), Err(AppError::TaskNotFound { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_is_ordered_by_creation() {
        let registry = TaskRegistry::new();
        let first = registry.submit(TaskKind::Search, json!({}));
        let second = registry.submit(TaskKind::Expand, json!({}));
        let third = registry.submit(TaskKind::Review, json!({}));

        let ids: Vec<Uuid> = registry.list().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&first.id()) && ids.contains(&second.id()) && ids.contains(&third.id()));
        let created: Vec<_> = registry.list().iter().map(|t| t.created_at).collect();
        assert!(created.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_review_task_reports_a_document() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Review, json!({"papers": ["2101.00001"]}));
        handle.start("Composing review").unwrap();
        let task = handle
            .complete(TaskResult::Document {
                content: "# Comparative review".to_string(),
            })
            .unwrap();
        assert!(matches!(task.result, Some(TaskResult::Document { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_pollers_see_monotonic_progress() {
        let registry = TaskRegistry::new();
        let handle = registry.submit(TaskKind::Expand, json!({}));
        let id = handle.id();
        handle.start("go").unwrap();

        let writer = tokio::spawn(async move {
            for i in 1..=50 {
                handle.progress(i as f64 / 50.0, format!("step {}", i)).unwrap();
                tokio::task::yield_now().await;
            }
            handle.complete(TaskResult::Expand(Default::default())).unwrap();
        });

        let poller = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let mut last = 0.0;
                let mut saw_terminal = false;
                loop {
                    let task = registry.get(id).unwrap();
                    assert!(task.progress >= last);
                    if saw_terminal {
                        assert!(task.is_terminal());
                    }
                    last = task.progress;
                    saw_terminal = task.is_terminal();
                    if saw_terminal && task.progress == 1.0 {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        poller.await.unwrap();
    }
}
