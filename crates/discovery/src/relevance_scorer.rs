//! Relevance scoring
//!
//! Asks the language model for one score per candidate, batch by batch.
//! Each score line is parsed on its own so one bad line never costs the
//! rest of the batch.

use futures::stream::{self, StreamExt};
use papertrail_common::capabilities::{Capability, CompletionConstraints, LanguageModel};
use papertrail_common::models::{Diagnostic, PaperRecord, Stage};
use regex_lite::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

use crate::throttle::Throttle;

/// Abstracts are cut to this many characters in prompts
const ABSTRACT_CHARS: usize = 1200;

static SCORE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[?\s*(\d+)\s*\]?\s*[:=.)\-]\s*\[?\s*(-?\d+(?:\.\d+)?|-?\.\d+)").expect("valid regex")
});

/// What a scoring pass could not do
#[derive(Debug, Clone, Default)]
pub struct ScoringReport {
    pub unscored: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct RelevanceScorer {
    llm: Arc<dyn LanguageModel>,
    batch_size: usize,
}

impl RelevanceScorer {
    pub fn new(llm: Arc<dyn LanguageModel>, batch_size: usize) -> Self {
        Self {
            llm,
            batch_size: batch_size.max(1),
        }
    }

    /// Score `papers` in place against `query`
    #[instrument(skip(self, papers, throttle), fields(candidates = papers.len()))]
    pub async fn score(&self, query: &str, papers: &mut [PaperRecord], throttle: &Throttle) -> ScoringReport {
        if papers.is_empty() {
            return ScoringReport::default();
        }

        // (prompt, batch size) per chunk, owned so the stream borrows nothing
        let prompts: Vec<(String, usize)> = papers
            .chunks(self.batch_size)
            .map(|batch| (build_prompt(query, batch), batch.len()))
            .collect();

        let replies: Vec<_> = stream::iter(prompts)
            .map(|(prompt, size)| async move {
                let constraints = CompletionConstraints {
                    max_tokens: 12 * size as u32 + 32,
                    temperature: 0.0,
                };
                throttle
                    .call(Capability::Llm, self.llm.complete(&prompt, &constraints))
                    .await
            })
            .buffered(throttle.limit())
            .collect()
            .await;

        let mut report = ScoringReport::default();
        for (batch, reply) in papers.chunks_mut(self.batch_size).zip(replies) {
            match reply {
                Ok(text) => {
                    let scores = parse_scores(&text, batch.len());
                    for (paper, score) in batch.iter_mut().zip(scores) {
                        match score {
                            Some(s) => paper.set_score(s),
                            None => {
                                paper.mark_unscored();
                                report.unscored += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, batch = batch.len(), "Scoring batch failed");
                    for paper in batch.iter_mut() {
                        paper.mark_unscored();
                    }
                    report.unscored += batch.len();
                    let subject = batch.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(",");
                    report
                        .diagnostics
                        .push(Diagnostic::new(Stage::Scoring, subject, e.to_string()));
                }
            }
        }

        debug!(unscored = report.unscored, "Scoring finished");
        report
    }
}

fn build_prompt(query: &str, batch: &[PaperRecord]) -> String {
    let mut prompt = format!(
        "Rate how relevant each paper is to the research question on a scale \
         from 0 to 1.\n\nResearch question: {}\n\n",
        query
    );
    for (i, paper) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] Title: {}\nAbstract: {}\n\n",
            i + 1,
            paper.title,
            truncate(&paper.summary, ABSTRACT_CHARS)
        ));
    }
    prompt.push_str(&format!(
        "Answer with exactly {} lines of the form `<number>: <score>`, one per paper, \
         and nothing else.\n",
        batch.len()
    ));
    prompt
}

/// One slot per candidate (1-based indices in the reply); the first parse
/// of an index wins and anything unparseable stays `None`.
fn parse_scores(reply: &str, count: usize) -> Vec<Option<f32>> {
    let mut scores = vec![None; count];
    for line in reply.lines() {
        let Some(caps) = SCORE_LINE.captures(line) else {
            continue;
        };
        let Ok(index) = caps[1].parse::<usize>() else {
            continue;
        };
        if index == 0 || index > count || scores[index - 1].is_some() {
            continue;
        }
        if let Ok(value) = caps[2].parse::<f32>() {
            if value.is_finite() {
                scores[index - 1] = Some(value.clamp(0.0, 1.0));
            }
        }
    }
    scores
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
