//! Run diagnostics
//!
//! Errors below the job boundary are recovered locally and recorded here
//! instead of failing the task.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a diagnostic originates from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    QueryExpansion,
    Search,
    Resolution,
    Scoring,
    Seeding,
    Citations,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::QueryExpansion => "query_expansion",
            Stage::Search => "search",
            Stage::Resolution => "resolution",
            Stage::Scoring => "scoring",
            Stage::Seeding => "seeding",
            Stage::Citations => "citations",
        };
        f.write_str(name)
    }
}

/// A recovered failure attached to a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,

    /// The unit that failed: a sub-query, a paper id, a reference
    pub subject: String,

    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Candidates dropped during a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardTally {
    /// References or hits that could not be mapped to a canonical id
    pub unresolved: usize,

    /// New candidates beyond a cap (per-layer or overall)
    pub over_cap: usize,
}

impl DiscardTally {
    pub fn total(&self) -> usize {
        self.unresolved + self.over_cap
    }

    pub fn merge(&mut self, other: DiscardTally) {
        self.unresolved += other.unresolved;
        self.over_cap += other.over_cap;
    }
}
