//! Core data model
//!
//! Papers, citation edges, run diagnostics and task records shared by the
//! discovery engine and the gateway.

mod citation;
mod paper;
mod run;
mod task;

pub use citation::CitationEdge;
pub use paper::{count_relevant, PaperMetadata, PaperRecord, PaperSource, RELEVANCE_THRESHOLD};
pub use run::{Diagnostic, DiscardTally, Stage};
pub use task::{ExpansionOutcome, SearchOutcome, Task, TaskKind, TaskResult, TaskStatus};
