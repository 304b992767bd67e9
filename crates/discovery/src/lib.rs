//! PaperTrail discovery engine
//!
//! Turns a research question into a scored, deduplicated paper set and
//! grows citation graphs around seed papers. Jobs run in the background
//! and are tracked by the [`TaskRegistry`].

pub mod expander;
pub mod graph;
pub mod query_expander;
pub mod relevance_scorer;
pub mod service;
pub mod source_searcher;
pub mod tasks;
pub mod throttle;

#[cfg(test)]
mod testing;

pub use expander::{CitationGraphExpander, ExpansionLimits, LayerReport, Seeding};
pub use graph::CitationGraph;
pub use query_expander::{QueryExpander, QueryExpansion};
pub use relevance_scorer::{RelevanceScorer, ScoringReport};
pub use service::{DirectSearchRequest, DirectSearchResult, DiscoveryService, ExpandRequest, SearchRequest};
pub use source_searcher::{SearchBatch, SearchLimits, SourceSearcher};
pub use tasks::{TaskHandle, TaskRegistry, TaskUpdate};
pub use throttle::Throttle;
