//! Citation edges

use serde::{Deserialize, Serialize};

/// Directed citation from `source` to `target`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEdge {
    /// Citing paper
    pub source: String,

    /// Cited paper
    pub target: String,

    /// Section of the citing paper the reference appears in
    pub section: String,
}

impl CitationEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            section: section.into(),
        }
    }

    /// Ordered pair used to collapse parallel edges
    pub fn key(&self) -> (&str, &str) {
        (&self.source, &self.target)
    }
}
