//! Query expansion
//!
//! Turns one research question into a handful of diversified search
//! queries. The stage never fails: an unusable model degrades to the
//! original query.

use papertrail_common::capabilities::{Capability, CompletionConstraints, LanguageModel};
use papertrail_common::models::{Diagnostic, Stage};
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

use crate::throttle::Throttle;

const SEARCH_TAG: &str = "[search]";
const STOP_TAG: &str = "[stopsearch]";

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:[-*•]+|\d+[.)]|\(\d+\))\s*"#).expect("valid regex"));

/// Sub-queries produced for one search, plus any degradation note
#[derive(Debug, Clone, Default)]
pub struct QueryExpansion {
    pub queries: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct QueryExpander {
    llm: Arc<dyn LanguageModel>,
    max_retries: u32,
}

impl QueryExpander {
    pub fn new(llm: Arc<dyn LanguageModel>, max_retries: u32) -> Self {
        Self { llm, max_retries }
    }

    /// Up to `count` unique, non-empty sub-queries for `query`
    #[instrument(skip(self, throttle), fields(count = count))]
    pub async fn expand(
        &self,
        query: &str,
        count: usize,
        style_hint: Option<&str>,
        throttle: &Throttle,
    ) -> QueryExpansion {
        let query = query.trim();
        let constraints = CompletionConstraints {
            max_tokens: 64 * count.max(1) as u32 + 32,
            temperature: 0.7,
        };

        let mut queries: Vec<String> = Vec::with_capacity(count);
        let mut seen: HashSet<String> = HashSet::new();
        let mut diagnostics = Vec::new();

        for attempt in 0..=self.max_retries {
            if queries.len() >= count {
                break;
            }

            let prompt = build_prompt(query, count, style_hint, &queries);
            match throttle.call(Capability::Llm, self.llm.complete(&prompt, &constraints)).await {
                Ok(reply) => {
                    let before = queries.len();
                    for suggestion in parse_suggestions(&reply) {
                        if seen.insert(normalize(&suggestion)) {
                            queries.push(suggestion);
                        }
                    }
                    debug!(attempt = attempt, added = queries.len() - before, "Parsed rewrites");
                }
                Err(e) if queries.is_empty() => {
                    warn!(error = %e, "Query expansion failed, falling back to the original query");
                    diagnostics.push(Diagnostic::new(Stage::QueryExpansion, query, e.to_string()));
                    return QueryExpansion {
                        queries: vec![query.to_string()],
                        diagnostics,
                    };
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt, "Query expansion retry failed");
                    diagnostics.push(Diagnostic::new(Stage::QueryExpansion, query, e.to_string()));
                    break;
                }
            }
        }

        if queries.len() < count && seen.insert(normalize(query)) {
            queries.push(query.to_string());
        }
        queries.truncate(count);

        QueryExpansion { queries, diagnostics }
    }
}

fn build_prompt(query: &str, count: usize, style_hint: Option<&str>, existing: &[String]) -> String {
    let mut prompt = format!(
        "You are helping a researcher find academic papers on arXiv.\n\
         Rewrite the research question below into {count} distinct Google search \
         queries that together cover its sub-topics, methods and terminology.\n\
         Write one query per line in the form `{SEARCH_TAG} <query>` and finish with \
         `{STOP_TAG}` on its own line.\n\n\
         Research question: {query}\n"
    );
    if let Some(hint) = style_hint.filter(|h| !h.trim().is_empty()) {
        prompt.push_str(&format!("Query style: {}\n", hint.trim()));
    }
    if !existing.is_empty() {
        prompt.push_str("Do not repeat these queries:\n");
        for q in existing {
            prompt.push_str(&format!("{} {}\n", SEARCH_TAG, q));
        }
    }
    prompt
}

/// Extract suggestions from a model reply.
///
/// Tagged `[search]` lines up to `[stopsearch]` are preferred; without any,
/// every non-empty line counts, list markers stripped.
fn parse_suggestions(reply: &str) -> Vec<String> {
    let body = match reply.to_ascii_lowercase().find(STOP_TAG) {
        Some(end) => &reply[..end],
        None => reply,
    };

    let lines: Vec<&str> = body.lines().collect();

    let tagged: Vec<String> = lines
        .iter()
        .filter_map(|line| {
            let line = LIST_MARKER.replace(line, "");
            let line = line.trim();
            let head = line.get(..SEARCH_TAG.len())?;
            if head.eq_ignore_ascii_case(SEARCH_TAG) {
                clean(&line[SEARCH_TAG.len()..])
            } else {
                None
            }
        })
        .collect();

    if !tagged.is_empty() {
        return tagged;
    }

    lines
        .iter()
        .filter_map(|line| clean(&LIST_MARKER.replace(line, "")))
        .collect()
}

fn clean(text: &str) -> Option<String> {
    let text = text.trim().trim_matches(|c| c == '"' || c == '`' || c == '\'').trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
