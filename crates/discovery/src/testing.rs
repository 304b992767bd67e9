//! Scripted in-memory capabilities for tests

use async_trait::async_trait;
use papertrail_common::capabilities::{
    Capabilities, Capability, CapabilityError, CitationRef, CitationSource, CompletionConstraints,
    LanguageModel, MetadataResolver, SearchEngine, SearchHit,
};
use papertrail_common::identifiers::arxiv_id_from_text;
use papertrail_common::models::PaperMetadata;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tracks concurrent calls across every fake sharing it
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    async fn track<T>(&self, delay: Duration, f: impl FnOnce() -> T) -> T {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        let out = f();
        self.current.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String, CapabilityError> + Send + Sync>;

/// Language model answering through a closure
pub struct ScriptedLlm {
    respond: Responder,
    pub prompts: Mutex<Vec<String>>,
    in_flight: Arc<InFlight>,
}

impl ScriptedLlm {
    pub fn new(respond: impl Fn(&str) -> Result<String, CapabilityError> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            prompts: Mutex::new(Vec::new()),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Answers rewrite prompts with `rewrites` and scoring prompts with
    /// `score` for every listed candidate
    pub fn pipeline(rewrites: &[&str], score: f32) -> Self {
        let rewrites: String = rewrites
            .iter()
            .map(|q| format!("[search] {}\n", q))
            .chain(std::iter::once("[stopsearch]\n".to_string()))
            .collect();
        Self::new(move |prompt| {
            if is_scoring_prompt(prompt) {
                Ok(score_all(prompt, score))
            } else {
                Ok(rewrites.clone())
            }
        })
    }

    pub fn failing() -> Self {
        Self::new(|_| {
            Err(CapabilityError::Unavailable {
                capability: Capability::Llm,
                message: "connection refused".into(),
            })
        })
    }
}

pub fn is_scoring_prompt(prompt: &str) -> bool {
    prompt.contains("Title:")
}

/// Number of `[i] Title:` entries in a scoring prompt
pub fn candidate_count(prompt: &str) -> usize {
    prompt.lines().filter(|l| l.starts_with('[') && l.contains("] Title:")).count()
}

/// A well-formed reply scoring every candidate in `prompt` as `score`
pub fn score_all(prompt: &str, score: f32) -> String {
    (1..=candidate_count(prompt))
        .map(|i| format!("{}: {}\n", i, score))
        .collect()
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn complete(&self, prompt: &str, _constraints: &CompletionConstraints) -> Result<String, CapabilityError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.in_flight.track(Duration::ZERO, || (self.respond)(prompt)).await
    }
}

/// Search engine serving fixed hits per query
#[derive(Default)]
pub struct FakeSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    failing: HashSet<String>,
    pub queries: Mutex<Vec<String>>,
    in_flight: Arc<InFlight>,
    delay: Duration,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>, delay: Duration) -> Self {
        self.in_flight = in_flight;
        self.delay = delay;
        self
    }
}

pub fn arxiv_hit(id: &str) -> SearchHit {
    SearchHit {
        title: format!("Paper {}", id),
        url: format!("https://arxiv.org/abs/{}v1", id),
        snippet: String::new(),
    }
}

#[async_trait]
impl SearchEngine for FakeSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CapabilityError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.in_flight
            .track(self.delay, || {
                if self.failing.contains(query) {
                    return Err(CapabilityError::Unavailable {
                        capability: Capability::Search,
                        message: "upstream status 503".into(),
                    });
                }
                Ok(self
                    .hits
                    .get(query)
                    .map(|hits| hits.iter().take(limit).cloned().collect())
                    .unwrap_or_default())
            })
            .await
    }
}

/// Metadata and citation source over a fixture graph
#[derive(Default)]
pub struct FakeScholar {
    papers: HashMap<String, PaperMetadata>,
    titles: HashMap<String, String>,
    references: HashMap<String, Vec<CitationRef>>,
    failing_citations: HashSet<String>,
    failing_resolve: HashSet<String>,
    pub resolved: Mutex<Vec<String>>,
    pub fetched: Mutex<Vec<String>>,
    in_flight: Arc<InFlight>,
    delay: Duration,
}

pub fn metadata(id: &str) -> PaperMetadata {
    PaperMetadata {
        id: id.to_string(),
        title: format!("Paper {}", id),
        authors: vec!["A. Author".to_string()],
        summary: format!("Abstract of {}", id),
        published: None,
    }
}

impl FakeScholar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolvable paper titled `Paper <id>`
    pub fn with_paper(mut self, id: &str) -> Self {
        let meta = metadata(id);
        self.titles.insert(meta.title.to_lowercase(), id.to_string());
        self.papers.insert(id.to_string(), meta);
        self
    }

    /// `citing` references each of `cited` (by `arXiv:<id>`), registering
    /// every id involved as a resolvable paper
    pub fn with_references(mut self, citing: &str, cited: &[&str]) -> Self {
        self = self.with_paper(citing);
        for id in cited {
            self = self.with_paper(id);
        }
        let refs = self.references.entry(citing.to_string()).or_default();
        refs.extend(cited.iter().map(|id| CitationRef {
            reference: format!("arXiv:{}", id),
            section: "references".to_string(),
        }));
        self
    }

    /// Append a raw reference string that may or may not resolve
    pub fn with_raw_reference(mut self, citing: &str, reference: &str, section: &str) -> Self {
        self.references
            .entry(citing.to_string())
            .or_default()
            .push(CitationRef {
                reference: reference.to_string(),
                section: section.to_string(),
            });
        self
    }

    pub fn failing_citations_for(mut self, id: &str) -> Self {
        self.failing_citations.insert(id.to_string());
        self
    }

    pub fn failing_resolve_for(mut self, reference: &str) -> Self {
        self.failing_resolve.insert(reference.to_string());
        self
    }

    pub fn with_in_flight(mut self, in_flight: Arc<InFlight>, delay: Duration) -> Self {
        self.in_flight = in_flight;
        self.delay = delay;
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolved.lock().unwrap().len()
    }

    pub fn citation_calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    fn lookup(&self, reference: &str) -> Option<PaperMetadata> {
        let reference = reference.trim();
        if let Some(id) = arxiv_id_from_text(reference) {
            return self.papers.get(&id).cloned();
        }
        if let Some(meta) = self.papers.get(reference) {
            return Some(meta.clone());
        }
        self.titles
            .get(&reference.to_lowercase())
            .and_then(|id| self.papers.get(id))
            .cloned()
    }
}

#[async_trait]
impl MetadataResolver for FakeScholar {
    async fn resolve(&self, reference: &str) -> Result<Option<PaperMetadata>, CapabilityError> {
        self.resolved.lock().unwrap().push(reference.to_string());
        self.in_flight
            .track(self.delay, || {
                if self.failing_resolve.contains(reference) {
                    return Err(CapabilityError::Unavailable {
                        capability: Capability::Metadata,
                        message: "timed out".into(),
                    });
                }
                Ok(self.lookup(reference))
            })
            .await
    }
}

#[async_trait]
impl CitationSource for FakeScholar {
    async fn citations(&self, paper_id: &str) -> Result<Vec<CitationRef>, CapabilityError> {
        self.fetched.lock().unwrap().push(paper_id.to_string());
        self.in_flight
            .track(self.delay, || {
                if self.failing_citations.contains(paper_id) {
                    return Err(CapabilityError::Unavailable {
                        capability: Capability::Citations,
                        message: "upstream status 502".into(),
                    });
                }
                Ok(self.references.get(paper_id).cloned().unwrap_or_default())
            })
            .await
    }
}

/// Wire fakes into a capability bundle
pub fn capabilities(llm: ScriptedLlm, search: FakeSearch, scholar: FakeScholar) -> Capabilities {
    let scholar = Arc::new(scholar);
    Capabilities {
        llm: Arc::new(llm),
        search: Arc::new(search),
        metadata: scholar.clone(),
        citations: scholar,
    }
}
