//! Paper records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Scores strictly above this count as relevant
pub const RELEVANCE_THRESHOLD: f32 = 0.5;

/// Number of papers scoring above [`RELEVANCE_THRESHOLD`]
pub fn count_relevant(papers: &[PaperRecord]) -> usize {
    papers.iter().filter(|p| p.score() > RELEVANCE_THRESHOLD).count()
}

/// How a paper entered a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperSource {
    /// Supplied by the caller (or promoted from search results) as a seed
    Seed,
    /// Found through web search
    Search,
    /// Found by following a citation
    Citation,
}

/// Canonical metadata returned by the metadata capability
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    /// Canonical id (version-less arXiv id when known)
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub published: Option<NaiveDate>,
}

/// A paper discovered by a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Canonical paper id, unique within a run
    pub id: String,

    pub title: String,

    /// Author names in publication order
    pub authors: Vec<String>,

    #[serde(rename = "abstract")]
    pub summary: String,

    pub published: Option<NaiveDate>,

    pub source: PaperSource,

    /// Relevance to the originating query, in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,

    /// Set when the scorer could not produce a score for this paper
    #[serde(default)]
    pub unscored: bool,

    /// Distance from the nearest seed
    pub depth: u32,

    /// Paper whose reference list led here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Section label of the citing context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl PaperRecord {
    /// Build a record from resolved metadata
    pub fn from_metadata(metadata: PaperMetadata, source: PaperSource, depth: u32) -> Self {
        Self {
            id: metadata.id,
            title: metadata.title,
            authors: metadata.authors,
            summary: metadata.summary,
            published: metadata.published,
            source,
            relevance_score: None,
            unscored: false,
            depth,
            parent_id: None,
            section: None,
        }
    }

    /// Attach the citing parent and section label
    pub fn cited_by(mut self, parent_id: impl Into<String>, section: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self.section = Some(section.into());
        self
    }

    /// Record a parsed score, clamped to [0, 1]
    pub fn set_score(&mut self, score: f32) {
        self.relevance_score = Some(score.clamp(0.0, 1.0));
        self.unscored = false;
    }

    /// Record a scoring failure: score 0 and flagged
    pub fn mark_unscored(&mut self) {
        self.relevance_score = Some(0.0);
        self.unscored = true;
    }

    /// Score used for ranking; unscored papers rank as 0
    pub fn score(&self) -> f32 {
        self.relevance_score.unwrap_or(0.0)
    }

    /// Keep the smaller of the recorded and observed depth
    pub fn refine_depth(&mut self, depth: u32) {
        self.depth = self.depth.min(depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> PaperMetadata {
        PaperMetadata {
            id: "2101.00001".to_string(),
            title: "Message Passing for Molecules".to_string(),
            authors: vec!["A. Author".to_string(), "B. Author".to_string()],
            summary: "We study graph networks.".to_string(),
            published: NaiveDate::from_ymd_opt(2021, 1, 1),
        }
    }

    #[test]
    fn test_scores_are_clamped() {
        let mut paper = PaperRecord::from_metadata(metadata(), PaperSource::Search, 0);
        paper.set_score(1.7);
        assert_eq!(paper.relevance_score, Some(1.0));
        paper.set_score(-0.2);
        assert_eq!(paper.relevance_score, Some(0.0));
    }

    #[test]
    fn test_unscored_papers_rank_as_zero() {
        let mut paper = PaperRecord::from_metadata(metadata(), PaperSource::Citation, 1);
        paper.mark_unscored();
        assert!(paper.unscored);
        assert_eq!(paper.score(), 0.0);
    }

    #[test]
    fn test_relevant_count_is_strictly_above_threshold() {
        let scored = |score: f32| {
            let mut paper = PaperRecord::from_metadata(metadata(), PaperSource::Search, 0);
            paper.set_score(score);
            paper
        };
        let mut unscored = PaperRecord::from_metadata(metadata(), PaperSource::Citation, 1);
        unscored.mark_unscored();

        let papers = vec![scored(0.9), scored(0.5), scored(0.51), scored(0.1), unscored];
        assert_eq!(count_relevant(&papers), 2);
        assert_eq!(count_relevant(&[]), 0);
    }

    #[test]
    fn test_depth_only_refines_downward() {
        let mut paper = PaperRecord::from_metadata(metadata(), PaperSource::Citation, 1);
        paper.refine_depth(2);
        assert_eq!(paper.depth, 1);
        paper.refine_depth(0);
        assert_eq!(paper.depth, 0);
    }

    #[test]
    fn test_abstract_field_name_on_the_wire() {
        let paper = PaperRecord::from_metadata(metadata(), PaperSource::Seed, 0);
        let json = serde_json::to_value(&paper).unwrap();
        assert_eq!(json["abstract"], "We study graph networks.");
        assert_eq!(json["source"], "seed");
        assert!(json.get("relevance_score").is_none());
    }
}
