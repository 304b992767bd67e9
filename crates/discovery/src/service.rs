//! Discovery service
//!
//! Validates submissions, records them in the task registry and runs each
//! job on its own tokio task. Callers get the task id back immediately and
//! poll for progress.

use chrono::NaiveDate;
use papertrail_common::capabilities::{Capabilities, Capability, MetadataResolver};
use papertrail_common::config::DiscoveryConfig;
use papertrail_common::errors::{AppError, Result};
use papertrail_common::metrics;
use papertrail_common::models::{
    count_relevant, Diagnostic, DiscardTally, PaperMetadata, PaperRecord, SearchOutcome, Task, TaskKind, TaskResult,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;
use validator::Validate;

use crate::expander::{CitationGraphExpander, ExpansionLimits, LayerReport, Seeding};
use crate::query_expander::QueryExpander;
use crate::relevance_scorer::RelevanceScorer;
use crate::source_searcher::{SearchLimits, SourceSearcher};
use crate::tasks::{TaskHandle, TaskRegistry};
use crate::throttle::Throttle;

/// Search submission; unset fields take the configured defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SearchRequest {
    #[validate(length(max = 2000))]
    pub query: String,

    #[validate(range(min = 1, max = 50))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_query_count: Option<usize>,

    #[validate(range(min = 1, max = 100))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_query_limit: Option<usize>,

    #[validate(range(min = 1, max = 1000))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_limit: Option<usize>,

    /// Free-form guidance for the query rewriter
    #[validate(length(max = 500))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_hint: Option<String>,

    /// Only papers published before this date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    /// Citation layers to grow around the top results (0 = none)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_layers: Option<u32>,

    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand_seed_count: Option<usize>,

    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_layer_cap: Option<usize>,

    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,
}

/// Expansion submission; unset fields take the configured defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ExpandRequest {
    /// arXiv ids, URLs or titles of the seed papers
    pub seed_ids: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_layers: Option<u32>,

    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_layer_cap: Option<usize>,

    #[validate(range(min = 1))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,

    /// Relevance intent for scoring; seed titles are used when absent
    #[validate(length(max = 2000))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// One web search resolved against the metadata source; no LLM, no task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DirectSearchRequest {
    #[validate(length(max = 2000))]
    pub query: String,

    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Resolved papers of a direct search, in hit order and unscored
#[derive(Debug, Clone, Serialize)]
pub struct DirectSearchResult {
    pub query: String,
    pub papers: Vec<PaperRecord>,
    pub total: usize,
    pub discarded: DiscardTally,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
struct SearchParams {
    query: String,
    generated_query_count: usize,
    style_hint: Option<String>,
    limits: SearchLimits,
    expand_layers: u32,
    expand_seed_count: usize,
    per_layer_cap: usize,
    concurrency_limit: usize,
}

#[derive(Debug, Clone)]
struct ExpandParams {
    seed_ids: Vec<String>,
    limits: ExpansionLimits,
    concurrency_limit: usize,
    query: Option<String>,
}

fn check_ceilings(concurrency_limit: usize, layers: u32, defaults: &DiscoveryConfig) -> Result<()> {
    if concurrency_limit > defaults.max_concurrency_limit {
        return Err(AppError::invalid_input(format!(
            "concurrency_limit {} exceeds the maximum of {}",
            concurrency_limit, defaults.max_concurrency_limit
        )));
    }
    if layers > defaults.max_layers_limit {
        return Err(AppError::invalid_input(format!(
            "{} layers exceeds the maximum of {}",
            layers, defaults.max_layers_limit
        )));
    }
    Ok(())
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::invalid_input(e.to_string())
}

impl SearchRequest {
    fn resolve(&self, defaults: &DiscoveryConfig) -> Result<SearchParams> {
        self.validate().map_err(validation_error)?;

        let query = self.query.trim();
        if query.is_empty() {
            return Err(AppError::invalid_input("query must not be empty"));
        }

        let concurrency_limit = self.concurrency_limit.unwrap_or(defaults.concurrency_limit);
        let expand_layers = self.expand_layers.unwrap_or(0);
        check_ceilings(concurrency_limit, expand_layers, defaults)?;

        let per_layer_cap = self.per_layer_cap.unwrap_or(defaults.per_layer_cap);
        let overall_limit = self.overall_limit.unwrap_or(defaults.overall_limit);

        Ok(SearchParams {
            query: query.to_string(),
            generated_query_count: self
                .generated_query_count
                .unwrap_or(defaults.generated_query_count),
            style_hint: self.style_hint.clone(),
            limits: SearchLimits {
                per_query_limit: self.per_query_limit.unwrap_or(defaults.per_query_limit),
                overall_limit,
                end_date: self.end_date,
            },
            expand_layers,
            expand_seed_count: self.expand_seed_count.unwrap_or(per_layer_cap),
            per_layer_cap,
            concurrency_limit,
        })
    }
}

impl ExpandRequest {
    fn resolve(&self, defaults: &DiscoveryConfig) -> Result<ExpandParams> {
        self.validate().map_err(validation_error)?;

        let mut seed_ids: Vec<String> = Vec::with_capacity(self.seed_ids.len());
        for id in self.seed_ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !seed_ids.iter().any(|s| s == id) {
                seed_ids.push(id.to_string());
            }
        }
        if seed_ids.is_empty() {
            return Err(AppError::invalid_input("at least one seed is required"));
        }

        let concurrency_limit = self.concurrency_limit.unwrap_or(defaults.concurrency_limit);
        let max_layers = self.max_layers.unwrap_or(defaults.max_layers);
        check_ceilings(concurrency_limit, max_layers, defaults)?;

        Ok(ExpandParams {
            seed_ids,
            limits: ExpansionLimits {
                max_layers,
                per_layer_cap: self.per_layer_cap.unwrap_or(defaults.per_layer_cap),
            },
            concurrency_limit,
            query: self.query.clone().filter(|q| !q.trim().is_empty()),
        })
    }
}

/// Stage objects shared by every worker
struct Pipeline {
    queries: QueryExpander,
    searcher: SourceSearcher,
    scorer: Arc<RelevanceScorer>,
    graph: CitationGraphExpander,
    metadata: Arc<dyn MetadataResolver>,
}

#[derive(Clone)]
pub struct DiscoveryService {
    registry: TaskRegistry,
    pipeline: Arc<Pipeline>,
    defaults: Arc<DiscoveryConfig>,
}

impl DiscoveryService {
    pub fn new(capabilities: Capabilities, defaults: DiscoveryConfig) -> Self {
        Self::with_registry(capabilities, defaults, TaskRegistry::new())
    }

    pub fn with_registry(capabilities: Capabilities, defaults: DiscoveryConfig, registry: TaskRegistry) -> Self {
        let scorer = Arc::new(RelevanceScorer::new(
            capabilities.llm.clone(),
            defaults.score_batch_size,
        ));
        let pipeline = Pipeline {
            queries: QueryExpander::new(capabilities.llm.clone(), defaults.expander_max_retries),
            searcher: SourceSearcher::new(capabilities.search.clone(), capabilities.metadata.clone()),
            graph: CitationGraphExpander::new(
                capabilities.citations.clone(),
                capabilities.metadata.clone(),
                scorer.clone(),
            ),
            scorer,
            metadata: capabilities.metadata.clone(),
        };

        Self {
            registry,
            pipeline: Arc::new(pipeline),
            defaults: Arc::new(defaults),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Queue a search job. Invalid requests still get a task, failed on
    /// the spot without a worker.
    #[instrument(skip(self, request), fields(query = %request.query))]
    pub fn submit_search(&self, request: SearchRequest) -> Result<Task> {
        let handle = self
            .registry
            .submit(TaskKind::Search, serde_json::to_value(&request)?);

        let params = match request.resolve(&self.defaults) {
            Ok(params) => params,
            Err(e) => {
                warn!(task_id = %handle.id(), error = %e, "Rejected search submission");
                return handle.fail(e.to_string());
            }
        };

        let snapshot = handle.snapshot()?;
        info!(task_id = %handle.id(), "Search task submitted");
        spawn_worker(handle.clone(), run_search(self.pipeline.clone(), handle, params));
        Ok(snapshot)
    }

    /// Queue a citation expansion job
    #[instrument(skip(self, request), fields(seeds = request.seed_ids.len()))]
    pub fn submit_expand(&self, request: ExpandRequest) -> Result<Task> {
        let handle = self
            .registry
            .submit(TaskKind::Expand, serde_json::to_value(&request)?);

        let params = match request.resolve(&self.defaults) {
            Ok(params) => params,
            Err(e) => {
                warn!(task_id = %handle.id(), error = %e, "Rejected expand submission");
                return handle.fail(e.to_string());
            }
        };

        let snapshot = handle.snapshot()?;
        info!(task_id = %handle.id(), "Expand task submitted");
        spawn_worker(handle.clone(), run_expand(self.pipeline.clone(), handle, params));
        Ok(snapshot)
    }

    pub fn get_task(&self, id: Uuid) -> Result<Task> {
        self.registry.get(id)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.registry.list()
    }

    pub fn delete_task(&self, id: Uuid) -> Result<()> {
        self.registry.delete(id)
    }

    /// Metadata for an arXiv id, URL or title
    #[instrument(skip(self))]
    pub async fn paper_info(&self, reference: &str) -> Result<PaperMetadata> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AppError::invalid_input("paper id must not be empty"));
        }

        let throttle = Throttle::new(1);
        throttle
            .call(Capability::Metadata, self.pipeline.metadata.resolve(reference))
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: reference.to_string(),
            })
    }

    /// Run a single search inline and return the resolved papers
    #[instrument(skip(self, request), fields(query = %request.query))]
    pub async fn direct_search(&self, request: DirectSearchRequest) -> Result<DirectSearchResult> {
        request.validate().map_err(validation_error)?;
        let query = request.query.trim();
        if query.is_empty() {
            return Err(AppError::invalid_input("query must not be empty"));
        }

        let limit = request.limit.unwrap_or(self.defaults.per_query_limit);
        let limits = SearchLimits {
            per_query_limit: limit,
            overall_limit: limit,
            end_date: None,
        };
        let throttle = Throttle::new(self.defaults.concurrency_limit);
        let batch = self
            .pipeline
            .searcher
            .search(&[query.to_string()], &limits, &throttle)
            .await?;

        info!(papers = batch.papers.len(), "Direct search finished");
        Ok(DirectSearchResult {
            query: query.to_string(),
            total: batch.papers.len(),
            papers: batch.papers,
            discarded: batch.discarded,
            diagnostics: batch.diagnostics,
        })
    }
}

/// Run `job` on its own tokio task and record its outcome. A panicking job
/// still leaves the task `failed`.
fn spawn_worker<F>(handle: TaskHandle, job: F)
where
    F: Future<Output = Result<TaskResult>> + Send + 'static,
{
    let task_id = handle.id();
    let span = info_span!("worker", task_id = %task_id);

    tokio::spawn(
        async move {
            let recorded = match tokio::spawn(job).await {
                Ok(Ok(result)) => handle.complete(result),
                Ok(Err(e)) => handle.fail(e.to_string()),
                Err(e) if e.is_panic() => {
                    error!("Worker panicked");
                    handle.fail(
                        AppError::InvariantViolation {
                            message: "worker panicked".to_string(),
                        }
                        .to_string(),
                    )
                }
                Err(e) => handle.fail(format!("Worker aborted: {}", e)),
            };

            if let Err(e) = recorded {
                debug!(error = %e, "Could not record task outcome");
            }
        }
        .instrument(span),
    );
}

/// Map a finished layer onto the `[base, base + span]` progress window.
/// Breaks once the task can no longer take progress (deleted or terminal).
fn report_layer(handle: &TaskHandle, base: f64, span: f64, report: &LayerReport) -> ControlFlow<()> {
    let fraction = report.layer as f64 / report.max_layers.max(1) as f64;
    let message = format!(
        "Layer {}/{}: {} new papers, {} visited",
        report.layer, report.max_layers, report.accepted, report.visited
    );
    match handle.progress(base + span * fraction, message) {
        Ok(_) => ControlFlow::Continue(()),
        Err(e) => {
            info!(task_id = %handle.id(), error = %e, "Task no longer takes progress, stopping expansion");
            ControlFlow::Break(())
        }
    }
}

#[instrument(skip_all, fields(task_id = %handle.id()))]
async fn run_search(pipeline: Arc<Pipeline>, handle: TaskHandle, params: SearchParams) -> Result<TaskResult> {
    handle.start("Search started")?;
    let throttle = Throttle::new(params.concurrency_limit);

    handle.progress(
        0.1,
        format!("Generating {} sub-queries", params.generated_query_count),
    )?;
    let expansion = pipeline
        .queries
        .expand(
            &params.query,
            params.generated_query_count,
            params.style_hint.as_deref(),
            &throttle,
        )
        .await;

    handle.progress(0.3, format!("Searching {} sub-queries", expansion.queries.len()))?;
    let batch = pipeline
        .searcher
        .search(&expansion.queries, &params.limits, &throttle)
        .await?;

    handle.progress(0.7, format!("Scoring {} papers", batch.papers.len()))?;
    let mut papers = batch.papers;
    let report = pipeline.scorer.score(&params.query, &mut papers, &throttle).await;
    papers.sort_by(|a, b| b.score().total_cmp(&a.score()));

    let mut diagnostics = expansion.diagnostics;
    diagnostics.extend(batch.diagnostics);
    diagnostics.extend(report.diagnostics);
    let mut discarded = batch.discarded;
    let mut unscored = report.unscored;
    let mut edges = Vec::new();

    if params.expand_layers > 0 && !papers.is_empty() {
        handle.progress(0.75, "Expanding citations of the top results")?;
        let outcome = pipeline
            .graph
            .expand(
                Seeding::Ranked {
                    papers,
                    seed_count: params.expand_seed_count,
                },
                Some(&params.query),
                ExpansionLimits {
                    max_layers: params.expand_layers,
                    per_layer_cap: params.per_layer_cap,
                },
                &throttle,
                |report| report_layer(&handle, 0.75, 0.2, report),
            )
            .await?;

        papers = outcome.papers;
        edges = outcome.edges;
        discarded.merge(outcome.discarded);
        unscored += outcome.unscored;
        diagnostics.extend(outcome.diagnostics);
    }

    handle.progress(0.95, "Assembling results")?;
    metrics::record_discards(discarded.unresolved, discarded.over_cap);
    metrics::record_unscored(unscored);

    let relevant = count_relevant(&papers);
    Ok(TaskResult::Search(SearchOutcome {
        queries: expansion.queries,
        total: papers.len(),
        papers,
        edges,
        discarded,
        unscored,
        relevant,
        failed_queries: batch.failed_queries,
        diagnostics,
    }))
}

#[instrument(skip_all, fields(task_id = %handle.id()))]
async fn run_expand(pipeline: Arc<Pipeline>, handle: TaskHandle, params: ExpandParams) -> Result<TaskResult> {
    handle.start("Expansion started")?;
    let throttle = Throttle::new(params.concurrency_limit);

    handle.progress(0.1, format!("Resolving {} seeds", params.seed_ids.len()))?;
    let outcome = pipeline
        .graph
        .expand(
            Seeding::Ids(params.seed_ids),
            params.query.as_deref(),
            params.limits,
            &throttle,
            |report| report_layer(&handle, 0.1, 0.85, report),
        )
        .await?;

    metrics::record_discards(outcome.discarded.unresolved, outcome.discarded.over_cap);
    metrics::record_unscored(outcome.unscored);

    Ok(TaskResult::Expand(outcome))
}
