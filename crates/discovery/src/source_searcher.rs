//! Multi-query source search
//!
//! Dispatches sub-queries to the search capability, maps raw hits to
//! canonical paper records and deduplicates across queries, first
//! occurrence wins.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use papertrail_common::capabilities::{
    Capability, CapabilityError, MetadataResolver, SearchEngine, SearchHit,
};
use papertrail_common::identifiers::arxiv_id_from_hit;
use papertrail_common::models::{Diagnostic, DiscardTally, PaperMetadata, PaperRecord, PaperSource, Stage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::throttle::Throttle;

/// Caps applied to one search
#[derive(Debug, Clone)]
pub struct SearchLimits {
    /// Raw hits requested per sub-query
    pub per_query_limit: usize,
    /// Records accepted overall
    pub overall_limit: usize,
    /// Only documents published before this date
    pub end_date: Option<NaiveDate>,
}

/// Deduplicated records of one search, in discovery order
#[derive(Debug, Clone, Default)]
pub struct SearchBatch {
    pub papers: Vec<PaperRecord>,
    pub discarded: DiscardTally,
    pub failed_queries: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of one sub-query: resolved hits in hit order, or why there are none
enum QueryResult {
    Resolved {
        papers: Vec<PaperMetadata>,
        unresolved: usize,
        diagnostics: Vec<Diagnostic>,
    },
    Failed(CapabilityError),
    Skipped,
}

pub struct SourceSearcher {
    search: Arc<dyn SearchEngine>,
    metadata: Arc<dyn MetadataResolver>,
}

impl SourceSearcher {
    pub fn new(search: Arc<dyn SearchEngine>, metadata: Arc<dyn MetadataResolver>) -> Self {
        Self { search, metadata }
    }

    /// Run every sub-query and merge the results.
    ///
    /// Fails only when the search capability failed for every sub-query.
    #[instrument(skip(self, queries, throttle), fields(queries = queries.len(), overall_limit = limits.overall_limit))]
    pub async fn search(
        &self,
        queries: &[String],
        limits: &SearchLimits,
        throttle: &Throttle,
    ) -> Result<SearchBatch, CapabilityError> {
        let full = AtomicBool::new(false);
        let full = &full;

        // Owned items keep the mapped futures free of higher-ranked borrows
        let mut results = stream::iter(queries.to_vec())
            .map(|query| async move {
                if full.load(Ordering::Acquire) {
                    return QueryResult::Skipped;
                }
                self.run_query(&query, limits, throttle, full).await
            })
            .buffered(throttle.limit());

        let mut batch = SearchBatch::default();
        let mut accepted: HashSet<String> = HashSet::new();
        let mut last_error = None;

        let mut index = 0;
        while let Some(result) = results.next().await {
            let query = &queries[index];
            index += 1;

            match result {
                QueryResult::Resolved {
                    papers,
                    unresolved,
                    diagnostics,
                } => {
                    batch.discarded.unresolved += unresolved;
                    batch.diagnostics.extend(diagnostics);
                    for meta in papers {
                        if accepted.contains(&meta.id) {
                            continue;
                        }
                        if batch.papers.len() >= limits.overall_limit {
                            batch.discarded.over_cap += 1;
                            continue;
                        }
                        accepted.insert(meta.id.clone());
                        batch.papers.push(PaperRecord::from_metadata(meta, PaperSource::Search, 0));
                    }
                    if batch.papers.len() >= limits.overall_limit {
                        full.store(true, Ordering::Release);
                    }
                }
                QueryResult::Failed(e) => {
                    warn!(query = %query, error = %e, "Sub-query failed");
                    batch.failed_queries += 1;
                    batch
                        .diagnostics
                        .push(Diagnostic::new(Stage::Search, query.as_str(), e.to_string()));
                    last_error = Some(e);
                }
                QueryResult::Skipped => {
                    debug!(query = %query, "Sub-query skipped, overall limit reached");
                }
            }
        }

        if !queries.is_empty() && batch.failed_queries == queries.len() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        info!(
            accepted = batch.papers.len(),
            unresolved = batch.discarded.unresolved,
            over_cap = batch.discarded.over_cap,
            failed_queries = batch.failed_queries,
            "Search finished"
        );
        Ok(batch)
    }

    async fn run_query(
        &self,
        query: &str,
        limits: &SearchLimits,
        throttle: &Throttle,
        full: &AtomicBool,
    ) -> QueryResult {
        let q = decorate(query, limits.end_date);
        let hits = match throttle
            .call(Capability::Search, self.search.search(&q, limits.per_query_limit))
            .await
        {
            Ok(hits) => hits,
            Err(e) => return QueryResult::Failed(e),
        };

        let mut unresolved = 0;
        let mut ids: Vec<String> = Vec::with_capacity(hits.len());
        for hit in hits.iter().take(limits.per_query_limit) {
            match hit_id(hit) {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => unresolved += 1,
            }
        }

        let lookups: Vec<(String, Option<Result<Option<PaperMetadata>, CapabilityError>>)> = stream::iter(ids)
            .map(|id| async move {
                if full.load(Ordering::Acquire) {
                    return (id, None);
                }
                let found = throttle
                    .call(Capability::Metadata, self.metadata.resolve(&id))
                    .await;
                (id, Some(found))
            })
            .buffered(throttle.limit())
            .collect()
            .await;

        let mut papers = Vec::with_capacity(lookups.len());
        let mut diagnostics = Vec::new();
        for (id, found) in lookups {
            match found {
                Some(Ok(Some(meta))) => papers.push(meta),
                Some(Ok(None)) => unresolved += 1,
                Some(Err(e)) => {
                    unresolved += 1;
                    diagnostics.push(Diagnostic::new(Stage::Resolution, id, e.to_string()));
                }
                None => {}
            }
        }

        QueryResult::Resolved {
            papers,
            unresolved,
            diagnostics,
        }
    }
}

fn hit_id(hit: &SearchHit) -> Option<String> {
    arxiv_id_from_hit(&hit.url, &hit.title, &hit.snippet)
}

fn decorate(query: &str, end_date: Option<NaiveDate>) -> String {
    match end_date {
        Some(date) => format!("{} before:{}", query, date.format("%Y-%m-%d")),
        None => query.to_string(),
    }
}
