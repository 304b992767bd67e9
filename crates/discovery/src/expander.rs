//! Citation graph expansion
//!
//! Breadth-first growth of a citation neighbourhood around seed papers:
//! `Seeding -> Expanding(layer) -> Done`. Each layer fetches the
//! references of every frontier node, resolves them to canonical ids and
//! admits unseen papers up to a per-layer cap. Revisits only add edges, so
//! the first (shallowest) depth recorded for a paper is final.

use futures::stream::{self, StreamExt};
use papertrail_common::capabilities::{
    Capability, CapabilityError, CitationRef, CitationSource, MetadataResolver,
};
use papertrail_common::errors::{AppError, Result};
use papertrail_common::identifiers::arxiv_id_from_text;
use papertrail_common::metrics;
use papertrail_common::models::{
    count_relevant, Diagnostic, DiscardTally, ExpansionOutcome, PaperMetadata, PaperRecord, PaperSource,
    Stage,
};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::graph::CitationGraph;
use crate::relevance_scorer::RelevanceScorer;
use crate::throttle::Throttle;

/// Where the initial frontier comes from
#[derive(Debug, Clone)]
pub enum Seeding {
    /// Explicit ids, resolved through the metadata capability
    Ids(Vec<String>),

    /// Ranked search output: every record is visited at depth 0, the first
    /// `seed_count` form the frontier
    Ranked {
        papers: Vec<PaperRecord>,
        seed_count: usize,
    },
}

/// Bounds of one expansion
#[derive(Debug, Clone, Copy)]
pub struct ExpansionLimits {
    pub max_layers: u32,
    pub per_layer_cap: usize,
}

/// Reported after every finished layer
#[derive(Debug, Clone, Copy)]
pub struct LayerReport {
    /// 1-based layer number
    pub layer: u32,
    pub max_layers: u32,
    pub accepted: usize,
    pub visited: usize,
}

/// Mutable state of one expansion, owned by the worker running it
#[derive(Debug, Default)]
pub struct DiscoveryRun {
    pub graph: CitationGraph,
    pub frontier: Vec<String>,
    pub layer: u32,
    pub discarded: DiscardTally,
    pub unscored: usize,
    pub layer_sizes: Vec<usize>,
    pub diagnostics: Vec<Diagnostic>,
    /// Ids turned away by a layer cap; they stay out for the rest of the run
    pub dropped: HashSet<String>,
    seeds: Vec<String>,
}

impl DiscoveryRun {
    fn into_outcome(self) -> Result<ExpansionOutcome> {
        self.graph.verify()?;
        let (papers, edges) = self.graph.into_parts();
        Ok(ExpansionOutcome {
            seeds: self.seeds,
            total: papers.len(),
            relevant: count_relevant(&papers),
            papers,
            edges,
            discarded: self.discarded,
            unscored: self.unscored,
            layers_completed: self.layer,
            layer_sizes: self.layer_sizes,
            diagnostics: self.diagnostics,
        })
    }
}

/// A reference mapped to its canonical id, ready to be admitted
struct Candidate {
    id: String,
    metadata: Option<PaperMetadata>,
}

pub struct CitationGraphExpander {
    citations: Arc<dyn CitationSource>,
    metadata: Arc<dyn MetadataResolver>,
    scorer: Arc<RelevanceScorer>,
}

impl CitationGraphExpander {
    pub fn new(
        citations: Arc<dyn CitationSource>,
        metadata: Arc<dyn MetadataResolver>,
        scorer: Arc<RelevanceScorer>,
    ) -> Self {
        Self {
            citations,
            metadata,
            scorer,
        }
    }

    /// Grow the citation graph around `seeding`.
    ///
    /// `intent` is the relevance question new papers are scored against;
    /// without one the seed titles stand in. `on_layer` runs after each
    /// completed layer; `Break` ends the expansion there.
    #[instrument(skip_all, fields(max_layers = limits.max_layers, per_layer_cap = limits.per_layer_cap))]
    pub async fn expand<P>(
        &self,
        seeding: Seeding,
        intent: Option<&str>,
        limits: ExpansionLimits,
        throttle: &Throttle,
        mut on_layer: P,
    ) -> Result<ExpansionOutcome>
    where
        P: FnMut(&LayerReport) -> ControlFlow<()> + Send,
    {
        let mut run = self.seed(seeding, throttle).await?;

        let intent = match intent.map(str::trim).filter(|s| !s.is_empty()) {
            Some(q) => q.to_string(),
            None => run
                .seeds
                .iter()
                .filter_map(|id| run.graph.get(id))
                .map(|p| p.title.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        };

        info!(seeds = run.seeds.len(), "Seeding finished");

        while run.layer < limits.max_layers && !run.frontier.is_empty() {
            let accepted = self.expand_layer(&mut run, &intent, limits, throttle).await?;
            run.layer += 1;
            run.layer_sizes.push(accepted);
            metrics::record_layer(run.layer, accepted);

            let report = LayerReport {
                layer: run.layer,
                max_layers: limits.max_layers,
                accepted,
                visited: run.graph.len(),
            };
            if on_layer(&report).is_break() {
                info!(layer = run.layer, "Expansion stopped by caller");
                break;
            }
        }

        info!(
            layers = run.layer,
            visited = run.graph.len(),
            edges = run.graph.edge_count(),
            unresolved = run.discarded.unresolved,
            over_cap = run.discarded.over_cap,
            "Expansion finished"
        );
        run.into_outcome()
    }

    async fn seed(&self, seeding: Seeding, throttle: &Throttle) -> Result<DiscoveryRun> {
        let mut run = DiscoveryRun::default();

        match seeding {
            Seeding::Ranked { papers, seed_count } => {
                for paper in papers {
                    let id = paper.id.clone();
                    if run.graph.insert(paper) && run.frontier.len() < seed_count {
                        run.frontier.push(id);
                    }
                }
            }
            Seeding::Ids(ids) => {
                let resolved: Vec<(String, std::result::Result<Option<PaperMetadata>, CapabilityError>)> =
                    stream::iter(ids)
                        .map(|id| async move {
                            let found = throttle
                                .call(Capability::Metadata, self.metadata.resolve(&id))
                                .await;
                            (id, found)
                        })
                        .buffered(throttle.limit())
                        .collect()
                        .await;

                for (id, found) in resolved {
                    match found {
                        Ok(Some(meta)) => {
                            let mut paper = PaperRecord::from_metadata(meta, PaperSource::Seed, 0);
                            paper.set_score(1.0);
                            let canonical = paper.id.clone();
                            if run.graph.insert(paper) {
                                run.frontier.push(canonical);
                            }
                        }
                        Ok(None) => {
                            warn!(seed = %id, "Seed could not be resolved");
                            run.discarded.unresolved += 1;
                            run.diagnostics
                                .push(Diagnostic::new(Stage::Seeding, id, "no matching paper"));
                        }
                        Err(e) => {
                            warn!(seed = %id, error = %e, "Seed resolution failed");
                            run.discarded.unresolved += 1;
                            run.diagnostics.push(Diagnostic::new(Stage::Seeding, id, e.to_string()));
                        }
                    }
                }

                if run.frontier.is_empty() {
                    return Err(AppError::invalid_input("no seeds resolvable"));
                }
            }
        }

        run.seeds = run.frontier.clone();
        Ok(run)
    }

    /// One breadth-first layer. Returns the number of papers admitted.
    #[instrument(skip_all, fields(layer = run.layer + 1, frontier = run.frontier.len()))]
    async fn expand_layer(
        &self,
        run: &mut DiscoveryRun,
        intent: &str,
        limits: ExpansionLimits,
        throttle: &Throttle,
    ) -> Result<usize> {
        let depth = run.layer + 1;
        let frontier = std::mem::take(&mut run.frontier);

        // Reference lists, in frontier order
        let fetched: Vec<(String, std::result::Result<Vec<CitationRef>, CapabilityError>)> =
            stream::iter(frontier)
                .map(|id| async move {
                    let refs = throttle
                        .call(Capability::Citations, self.citations.citations(&id))
                        .await;
                    (id, refs)
                })
                .buffered(throttle.limit())
                .collect()
                .await;

        // Every distinct reference that is not already known to be visited
        let mut pending: Vec<String> = Vec::new();
        let mut queued: HashSet<&str> = HashSet::new();
        for (_, refs) in &fetched {
            let Ok(refs) = refs else { continue };
            for r in refs {
                let shortcut = arxiv_id_from_text(&r.reference);
                if shortcut
                    .as_deref()
                    .is_some_and(|id| run.graph.contains(id) || run.dropped.contains(id))
                {
                    continue;
                }
                if queued.insert(r.reference.as_str()) {
                    pending.push(r.reference.clone());
                }
            }
        }

        let resolved: HashMap<String, std::result::Result<Option<PaperMetadata>, CapabilityError>> =
            stream::iter(pending)
                .map(|reference| async move {
                    let found = throttle
                        .call(Capability::Metadata, self.metadata.resolve(&reference))
                        .await;
                    (reference, found)
                })
                .buffered(throttle.limit())
                .collect()
                .await;

        // Admission, sequential in discovery order
        let start = run.graph.len();
        let mut accepted: Vec<String> = Vec::new();
        let mut over_cap = 0;
        let mut reported: HashSet<&str> = HashSet::new();

        for (parent, refs) in &fetched {
            let refs = match refs {
                Ok(refs) => refs,
                Err(e) => {
                    warn!(paper_id = %parent, error = %e, "Citation fetch failed");
                    run.diagnostics
                        .push(Diagnostic::new(Stage::Citations, parent.as_str(), e.to_string()));
                    continue;
                }
            };

            for r in refs {
                if arxiv_id_from_text(&r.reference).is_some_and(|id| run.dropped.contains(&id)) {
                    continue;
                }
                let candidate = match candidate_for(r, &resolved, &run.graph) {
                    Ok(c) => c,
                    Err(reason) => {
                        run.discarded.unresolved += 1;
                        if let Some(message) = reason {
                            if reported.insert(r.reference.as_str()) {
                                run.diagnostics.push(Diagnostic::new(
                                    Stage::Resolution,
                                    r.reference.as_str(),
                                    message,
                                ));
                            }
                        }
                        continue;
                    }
                };

                if candidate.id == *parent {
                    continue;
                }

                if run.graph.contains(&candidate.id) {
                    run.graph.refine_depth(&candidate.id, depth);
                    run.graph.add_edge(parent, &candidate.id, &r.section);
                    continue;
                }

                if run.dropped.contains(&candidate.id) {
                    continue;
                }

                if accepted.len() >= limits.per_layer_cap {
                    run.dropped.insert(candidate.id);
                    run.discarded.over_cap += 1;
                    over_cap += 1;
                    continue;
                }

                let Some(meta) = candidate.metadata else {
                    return Err(AppError::InvariantViolation {
                        message: format!("unvisited candidate {} has no metadata", candidate.id),
                    });
                };
                let paper = PaperRecord::from_metadata(meta, PaperSource::Citation, depth)
                    .cited_by(parent.as_str(), r.section.as_str());
                run.graph.insert(paper);
                run.graph.add_edge(parent, &candidate.id, &r.section);
                accepted.push(candidate.id);
            }
        }

        // Score newly admitted papers
        let report = self
            .scorer
            .score(intent, run.graph.papers_since_mut(start), throttle)
            .await;
        run.unscored += report.unscored;
        run.diagnostics.extend(report.diagnostics);

        debug!(accepted = accepted.len(), over_cap, "Layer finished");

        let admitted = accepted.len();
        run.frontier = accepted;
        Ok(admitted)
    }
}

/// Map a reference to its canonical id.
///
/// `Err(None)` means the reference simply has no match; `Err(Some(_))`
/// carries a capability failure worth a diagnostic.
fn candidate_for(
    reference: &CitationRef,
    resolved: &HashMap<String, std::result::Result<Option<PaperMetadata>, CapabilityError>>,
    graph: &CitationGraph,
) -> std::result::Result<Candidate, Option<String>> {
    if let Some(id) = arxiv_id_from_text(&reference.reference) {
        if graph.contains(&id) {
            return Ok(Candidate { id, metadata: None });
        }
    }

    match resolved.get(&reference.reference) {
        Some(Ok(Some(meta))) => Ok(Candidate {
            id: meta.id.clone(),
            metadata: Some(meta.clone()),
        }),
        Some(Ok(None)) | None => Err(None),
        Some(Err(e)) => Err(Some(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeScholar, InFlight, ScriptedLlm};
    use std::time::Duration;

    fn expander(scholar: FakeScholar) -> CitationGraphExpander {
        expander_with(scholar, ScriptedLlm::pipeline(&[], 0.5))
    }

    fn expander_with(scholar: FakeScholar, llm: ScriptedLlm) -> CitationGraphExpander {
        let scholar = Arc::new(scholar);
        let scorer = Arc::new(RelevanceScorer::new(Arc::new(llm), 10));
        CitationGraphExpander::new(scholar.clone(), scholar, scorer)
    }

    fn limits(max_layers: u32, per_layer_cap: usize) -> ExpansionLimits {
        ExpansionLimits {
            max_layers,
            per_layer_cap,
        }
    }

    fn seeds(ids: &[&str]) -> Seeding {
        Seeding::Ids(ids.iter().map(|s| s.to_string()).collect())
    }

    fn ids(papers: &[PaperRecord]) -> Vec<&str> {
        papers.iter().map(|p| p.id.as_str()).collect()
    }

    fn keep_going(_: &LayerReport) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    #[tokio::test]
    async fn test_zero_layers_returns_only_seeds() {
        let scholar = FakeScholar::new().with_references("2101.00001", &["2101.00002"]);
        let out = expander(scholar)
            .expand(seeds(&["2101.00001"]), None, limits(0, 10), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        assert_eq!(ids(&out.papers), ["2101.00001"]);
        assert!(out.edges.is_empty());
        assert_eq!(out.layers_completed, 0);
        assert_eq!(out.papers[0].source, PaperSource::Seed);
        assert_eq!(out.papers[0].relevance_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_per_layer_cap_keeps_first_discovered() {
        let cited: Vec<String> = (1..=25).map(|i| format!("2102.{:05}", i)).collect();
        let cited: Vec<&str> = cited.iter().map(|s| s.as_str()).collect();
        let scholar = FakeScholar::new().with_references("2101.00001", &cited);

        let out = expander(scholar)
            .expand(seeds(&["2101.00001"]), None, limits(2, 20), &Throttle::new(4), keep_going)
            .await
            .unwrap();

        let layer_one: Vec<&str> = out.at_depth(1).map(|p| p.id.as_str()).collect();
        assert_eq!(layer_one, cited[..20]);
        assert_eq!(out.discarded.over_cap, 5);
        assert_eq!(out.discarded.total(), 5);
        assert_eq!(out.layer_sizes[0], 20);
        assert_eq!(out.edges.len(), 20);
    }

    #[tokio::test]
    async fn test_shorter_path_keeps_minimal_depth() {
        // A cites B and C; C cites B. B must stay at depth 1.
        let scholar = FakeScholar::new()
            .with_references("2101.00001", &["2101.00002", "2101.00003"])
            .with_references("2101.00003", &["2101.00002"]);

        let out = expander(scholar)
            .expand(seeds(&["2101.00001"]), None, limits(2, 10), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        let b: Vec<&PaperRecord> = out.papers.iter().filter(|p| p.id == "2101.00002").collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].depth, 1);
        assert_eq!(out.total, 3);
        assert!(out
            .edges
            .iter()
            .any(|e| e.source == "2101.00003" && e.target == "2101.00002"));
    }

    #[tokio::test]
    async fn test_revisit_adds_edge_without_duplicate() {
        // Cycle: A -> B -> A
        let scholar = FakeScholar::new()
            .with_references("2101.00001", &["2101.00002"])
            .with_references("2101.00002", &["2101.00001"]);

        let out = expander(scholar)
            .expand(seeds(&["2101.00001"]), None, limits(3, 10), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        assert_eq!(out.total, 2);
        assert_eq!(out.edges.len(), 2);
        let seed = out.papers.iter().find(|p| p.id == "2101.00001").unwrap();
        assert_eq!(seed.depth, 0);
        // Frontier empties after layer 2
        assert_eq!(out.layers_completed, 2);
        assert_eq!(out.layer_sizes, vec![1, 0]);
    }

    #[tokio::test]
    async fn test_failed_frontier_node_is_isolated() {
        let mut scholar = FakeScholar::new().with_references(
            "2101.00000",
            &["2101.00001", "2101.00002", "2101.00003", "2101.00004", "2101.00005"],
        );
        for i in 1..=5 {
            scholar = scholar.with_references(&format!("2101.0000{}", i), &[&format!("2103.0000{}", i)]);
        }
        let scholar = scholar.failing_citations_for("2101.00003");

        let out = expander(scholar)
            .expand(seeds(&["2101.00000"]), None, limits(2, 10), &Throttle::new(4), keep_going)
            .await
            .unwrap();

        let layer_two: Vec<&str> = out.at_depth(2).map(|p| p.id.as_str()).collect();
        assert_eq!(layer_two, ["2103.00001", "2103.00002", "2103.00004", "2103.00005"]);
        let citation_failures: Vec<&Diagnostic> =
            out.diagnostics.iter().filter(|d| d.stage == Stage::Citations).collect();
        assert_eq!(citation_failures.len(), 1);
        assert_eq!(citation_failures[0].subject, "2101.00003");
    }

    #[tokio::test]
    async fn test_unresolved_references_are_tallied() {
        let scholar = FakeScholar::new()
            .with_references("2101.00001", &["2101.00002"])
            .with_raw_reference("2101.00001", "Some Unindexed Book", "background")
            .with_raw_reference("2101.00001", "arXiv:2109.99999", "background")
            .with_raw_reference("2101.00001", "2101.00001", "introduction");

        let out = expander(scholar)
            .expand(seeds(&["2101.00001"]), None, limits(1, 10), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        assert_eq!(out.total, 2);
        assert_eq!(out.discarded.unresolved, 2);
        assert_eq!(out.discarded.over_cap, 0);
        // Self-citation: no edge, no discard
        assert!(out.edges.iter().all(|e| e.source != e.target));
    }

    #[tokio::test]
    async fn test_no_resolvable_seed_is_invalid_input() {
        let result = expander(FakeScholar::new())
            .expand(seeds(&["2199.00001", "Nothing"]), None, limits(1, 10), &Throttle::new(2), keep_going)
            .await;

        assert!(matches!(result, Err(AppError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_partial_seed_failure_is_noted() {
        let scholar = FakeScholar::new().with_paper("2101.00001");
        let out = expander(scholar)
            .expand(seeds(&["2101.00001", "2199.00001"]), None, limits(1, 10), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        assert_eq!(out.seeds, vec!["2101.00001".to_string()]);
        assert_eq!(out.discarded.unresolved, 1);
        assert_eq!(out.diagnostics[0].stage, Stage::Seeding);
    }

    #[tokio::test]
    async fn test_new_papers_are_scored_against_intent() {
        let llm = Arc::new(ScriptedLlm::pipeline(&[], 0.7));
        let scholar = Arc::new(FakeScholar::new().with_references("2101.00001", &["2101.00002", "2101.00003"]));
        let scorer = Arc::new(RelevanceScorer::new(llm.clone(), 10));
        let expander = CitationGraphExpander::new(scholar.clone(), scholar, scorer);

        let out = expander
            .expand(seeds(&["2101.00001"]), Some("molecule design"), limits(1, 10), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        assert!(out.at_depth(1).all(|p| p.relevance_score == Some(0.7)));
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompts.lock().unwrap()[0].contains("molecule design"));
    }

    #[tokio::test]
    async fn test_intent_defaults_to_seed_titles() {
        let llm = Arc::new(ScriptedLlm::pipeline(&[], 0.7));
        let scholar = Arc::new(FakeScholar::new().with_references("2101.00001", &["2101.00002"]));
        let scorer = Arc::new(RelevanceScorer::new(llm.clone(), 10));
        let expander = CitationGraphExpander::new(scholar.clone(), scholar, scorer);

        expander
            .expand(seeds(&["2101.00001"]), None, limits(1, 10), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        assert!(llm.prompts.lock().unwrap()[0].contains("Research question: Paper 2101.00001"));
    }

    #[tokio::test]
    async fn test_ranked_seeding_uses_top_records() {
        let scholar = FakeScholar::new()
            .with_references("2101.00001", &["2104.00001"])
            .with_references("2101.00002", &["2104.00002"])
            .with_references("2101.00003", &["2101.00001"]);
        let ranked: Vec<PaperRecord> = ["2101.00001", "2101.00002", "2101.00003"]
            .iter()
            .map(|id| PaperRecord::from_metadata(crate::testing::metadata(id), PaperSource::Search, 0))
            .collect();

        let out = expander(scholar)
            .expand(
                Seeding::Ranked {
                    papers: ranked,
                    seed_count: 2,
                },
                Some("q"),
                limits(1, 10),
                &Throttle::new(2),
                keep_going,
            )
            .await
            .unwrap();

        assert_eq!(out.seeds, vec!["2101.00001".to_string(), "2101.00002".to_string()]);
        assert_eq!(out.at_depth(0).count(), 3);
        assert_eq!(ids(&out.papers[3..]), ["2104.00001", "2104.00002"]);
    }

    #[tokio::test]
    async fn test_layer_reports_and_concurrency_ceiling() {
        let in_flight = Arc::new(InFlight::default());
        let first: Vec<String> = (1..=8).map(|i| format!("2105.{:05}", i)).collect();
        let mut scholar =
            FakeScholar::new().with_references("2101.00001", &first.iter().map(|s| s.as_str()).collect::<Vec<_>>());
        for (i, id) in first.iter().enumerate() {
            scholar = scholar.with_references(id, &[&format!("2106.{:05}", i)]);
        }
        let scholar = scholar.with_in_flight(in_flight.clone(), Duration::from_millis(2));
        let llm = ScriptedLlm::pipeline(&[], 0.5).with_in_flight(in_flight.clone());

        let mut reports = Vec::new();
        let out = expander_with(scholar, llm)
            .expand(seeds(&["2101.00001"]), None, limits(2, 50), &Throttle::new(3), |r| {
                reports.push(*r);
                ControlFlow::Continue(())
            })
            .await
            .unwrap();

        assert!(in_flight.peak() <= 3, "peak {}", in_flight.peak());
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].layer, 1);
        assert_eq!(reports[0].accepted, 8);
        assert_eq!(reports[1].accepted, 8);
        assert_eq!(out.total, 17);
    }
    #[tokio::test]
    async fn test_capped_paper_stays_out_in_later_layers() {
        // A cites P1..P3, P1 also cites P3; the cap of two turns P3 away in
        // layer one and layer two must not bring it back deeper.
        let scholar = FakeScholar::new()
            .with_references("2101.00001", &["2102.00001", "2102.00002", "2102.00003"])
            .with_references("2102.00001", &["2102.00003"]);

        let out = expander(scholar)
            .expand(seeds(&["2101.00001"]), None, limits(2, 2), &Throttle::new(2), keep_going)
            .await
            .unwrap();

        assert_eq!(ids(&out.papers), ["2101.00001", "2102.00001", "2102.00002"]);
        assert_eq!(out.discarded.over_cap, 1);
        assert_eq!(out.discarded.unresolved, 0);
        let edges: Vec<(&str, &str)> = out.edges.iter().map(|e| e.key()).collect();
        assert_eq!(edges, [("2101.00001", "2102.00001"), ("2101.00001", "2102.00002")]);
        assert_eq!(out.layer_sizes, vec![2, 0]);
    }

    #[tokio::test]
    async fn test_break_from_layer_callback_stops_fetching() {
        let scholar = Arc::new(
            FakeScholar::new()
                .with_references("2101.00001", &["2102.00001"])
                .with_references("2102.00001", &["2103.00001"])
                .with_references("2103.00001", &["2104.00001"]),
        );
        let scorer = Arc::new(RelevanceScorer::new(Arc::new(ScriptedLlm::pipeline(&[], 0.5)), 10));
        let expander = CitationGraphExpander::new(scholar.clone(), scholar.clone(), scorer);

        let out = expander
            .expand(seeds(&["2101.00001"]), None, limits(5, 10), &Throttle::new(2), |_| {
                ControlFlow::Break(())
            })
            .await
            .unwrap();

        assert_eq!(scholar.citation_calls(), 1);
        assert_eq!(out.layers_completed, 1);
        assert_eq!(out.total, 2);
    }
}
