//! In-memory citation graph of one discovery run
//!
//! Nodes are keyed by canonical paper id; the visited set doubles as the
//! node set, so revisiting a paper is an edge-only operation and cycles need
//! no special handling.

use papertrail_common::errors::{AppError, Result};
use papertrail_common::models::{CitationEdge, PaperRecord};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct CitationGraph {
    /// Records in discovery order
    papers: Vec<PaperRecord>,

    /// paper_id -> position in `papers`
    index: HashMap<String, usize>,

    /// Edges in discovery order, at most one per ordered pair
    edges: Vec<CitationEdge>,

    /// (source, target) pairs already in `edges`
    pairs: HashSet<(String, String)>,
}

impl CitationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&PaperRecord> {
        self.index.get(id).map(|&i| &self.papers[i])
    }

    /// Add a newly visited paper. Returns false when the id is already
    /// visited; the existing record is left untouched.
    pub fn insert(&mut self, paper: PaperRecord) -> bool {
        if self.index.contains_key(&paper.id) {
            return false;
        }
        self.index.insert(paper.id.clone(), self.papers.len());
        self.papers.push(paper);
        true
    }

    /// Keep the smaller of the recorded and observed depth
    pub fn refine_depth(&mut self, id: &str, depth: u32) {
        if let Some(&i) = self.index.get(id) {
            self.papers[i].refine_depth(depth);
        }
    }

    /// Record `source` citing `target`. Self-citations and repeated pairs
    /// are ignored; the first section label observed for a pair is kept.
    pub fn add_edge(&mut self, source: &str, target: &str, section: &str) -> bool {
        if source == target {
            return false;
        }
        if !self.pairs.insert((source.to_string(), target.to_string())) {
            return false;
        }
        self.edges.push(CitationEdge::new(source, target, section));
        true
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Records inserted at or after position `start`, for in-place scoring
    pub fn papers_since_mut(&mut self, start: usize) -> &mut [PaperRecord] {
        let start = start.min(self.papers.len());
        &mut self.papers[start..]
    }

    /// Check the structural invariants: unique ids and edges whose
    /// endpoints are both visited.
    pub fn verify(&self) -> Result<()> {
        if self.index.len() != self.papers.len() {
            return Err(AppError::InvariantViolation {
                message: format!(
                    "visited set has {} keys for {} records",
                    self.index.len(),
                    self.papers.len()
                ),
            });
        }

        let mut seen = HashSet::with_capacity(self.edges.len());
        for edge in &self.edges {
            if !self.contains(&edge.source) || !self.contains(&edge.target) {
                return Err(AppError::InvariantViolation {
                    message: format!("edge {} -> {} has an unvisited endpoint", edge.source, edge.target),
                });
            }
            if !seen.insert(edge.key()) {
                return Err(AppError::InvariantViolation {
                    message: format!("duplicate edge {} -> {}", edge.source, edge.target),
                });
            }
        }
        Ok(())
    }

    /// Consume the graph: papers ordered by depth then discovery order,
    /// and the edge list.
    pub fn into_parts(self) -> (Vec<PaperRecord>, Vec<CitationEdge>) {
        let mut papers = self.papers;
        papers.sort_by_key(|p| p.depth);
        (papers, self.edges)
    }
}
