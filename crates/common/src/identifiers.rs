//! Paper identifier heuristics
//!
//! Extracts version-less arXiv ids from URLs, citation strings and titles.

use regex_lite::Regex;
use std::sync::LazyLock;

static ARXIV_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv\.org/(?:abs|pdf|html)/(\d{4}\.\d{4,5})(?:v\d+)?").expect("valid regex")
});

static ARXIV_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)arxiv\s*:\s*(\d{4}\.\d{4,5})(?:v\d+)?").expect("valid regex")
});

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}\.\d{4,5})(?:v\d+)?$").expect("valid regex"));

/// Extract an arXiv id from a URL such as `https://arxiv.org/pdf/2101.00001v2`
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    ARXIV_URL.captures(url).map(|c| c[1].to_string())
}

/// Extract an arXiv id from free text, either tagged (`arXiv:2101.00001`),
/// linked, or given bare
pub fn arxiv_id_from_text(text: &str) -> Option<String> {
    let text = text.trim();
    if let Some(c) = BARE_ID.captures(text) {
        return Some(c[1].to_string());
    }
    if let Some(c) = ARXIV_TAG.captures(text) {
        return Some(c[1].to_string());
    }
    arxiv_id_from_url(text)
}

/// Identifier heuristic for a raw search hit: URL first, then title and snippet
pub fn arxiv_id_from_hit(url: &str, title: &str, snippet: &str) -> Option<String> {
    arxiv_id_from_url(url)
        .or_else(|| arxiv_id_from_text(title))
        .or_else(|| arxiv_id_from_text(snippet))
}

/// Whether `id` is a canonical arXiv id
pub fn is_arxiv_id(id: &str) -> bool {
    BARE_ID.is_match(id)
}
