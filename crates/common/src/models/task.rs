//! Asynchronous task records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{CitationEdge, Diagnostic, DiscardTally, PaperRecord};

/// Kind of work a task performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Search,
    Expand,
    Review,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Search => "search",
            TaskKind::Expand => "expand",
            TaskKind::Review => "review",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Completed and failed are sticky
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Staying in `processing` is allowed so progress-only updates pass.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Processing)
                | (TaskStatus::Queued, TaskStatus::Failed)
                | (TaskStatus::Processing, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a completed search task
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Sub-queries actually dispatched
    pub queries: Vec<String>,

    /// Papers ordered by relevance, highest first
    pub papers: Vec<PaperRecord>,

    /// Citation edges when the search also expanded its top results
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<CitationEdge>,

    pub total: usize,
    pub discarded: DiscardTally,
    pub unscored: usize,

    /// Papers scoring above 0.5
    pub relevant: usize,

    /// Sub-queries whose search call failed
    pub failed_queries: usize,

    pub diagnostics: Vec<Diagnostic>,
}

/// Result of a completed expansion task
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionOutcome {
    /// Seeds that resolved and started the run
    pub seeds: Vec<String>,

    /// Visited set ordered by depth, then discovery order
    pub papers: Vec<PaperRecord>,

    pub edges: Vec<CitationEdge>,
    pub total: usize,
    pub discarded: DiscardTally,
    pub unscored: usize,
    pub relevant: usize,
    pub layers_completed: u32,

    /// New papers added per layer, layer 1 first
    pub layer_sizes: Vec<usize>,

    pub diagnostics: Vec<Diagnostic>,
}

impl ExpansionOutcome {
    /// Papers first discovered at `depth`
    pub fn at_depth(&self, depth: u32) -> impl Iterator<Item = &PaperRecord> {
        self.papers.iter().filter(move |p| p.depth == depth)
    }
}

/// Kind-specific payload of a completed task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskResult {
    Search(SearchOutcome),
    Expand(ExpansionOutcome),
    /// Free-form document reported by an external composer
    Document { content: String },
}

/// Point-in-time snapshot of a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub status: TaskStatus,

    /// Fraction complete in [0, 1], never decreasing
    pub progress: f64,

    /// Latest human-readable progress note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Submitted parameters
    pub input: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A freshly submitted task
    pub fn queued(kind: TaskKind, input: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            status: TaskStatus::Queued,
            progress: 0.0,
            message: Some("Task queued".to_string()),
            input,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
