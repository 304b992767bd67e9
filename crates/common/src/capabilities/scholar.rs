//! Semantic Scholar Graph API client
//!
//! Serves both metadata resolution and reference lists. Canonical ids are
//! version-less arXiv ids when the paper has one, the Semantic Scholar
//! `paperId` otherwise.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::http::Transport;
use super::{Capability, CapabilityError, CitationRef, CitationSource, MetadataResolver};
use crate::config::ScholarConfig;
use crate::identifiers::{arxiv_id_from_text, is_arxiv_id};
use crate::models::PaperMetadata;

const PAPER_FIELDS: &str = "title,authors,abstract,publicationDate,externalIds";
const REFERENCE_FIELDS: &str = "title,externalIds,intents";

/// Section label used when the provider reports no citation intent
pub const DEFAULT_SECTION: &str = "references";

pub struct SemanticScholarClient {
    metadata: Transport,
    citations: Transport,
    api_base: String,
    api_key: Option<String>,
    reference_limit: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<S2Author>,
    #[serde(rename = "abstract", default)]
    summary: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    external_ids: Option<S2ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "ArXiv", default)]
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Match {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
struct S2References {
    #[serde(default)]
    data: Vec<S2Reference>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Reference {
    #[serde(default)]
    intents: Option<Vec<String>>,
    #[serde(default)]
    cited_paper: Option<S2Paper>,
}

impl S2Paper {
    fn arxiv_id(&self) -> Option<String> {
        self.external_ids
            .as_ref()
            .and_then(|ids| ids.arxiv.as_deref())
            .and_then(arxiv_id_from_text)
    }

    fn canonical_id(&self) -> Option<String> {
        self.arxiv_id().or_else(|| self.paper_id.clone())
    }

    fn into_metadata(self) -> Option<PaperMetadata> {
        let id = self.canonical_id()?;
        let published = self
            .publication_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        Some(PaperMetadata {
            id,
            title: self.title.unwrap_or_default(),
            authors: self.authors.into_iter().filter_map(|a| a.name).collect(),
            summary: self.summary.unwrap_or_default(),
            published,
        })
    }
}

impl S2Reference {
    fn into_citation(self) -> Option<CitationRef> {
        let paper = self.cited_paper?;
        let reference = match paper.arxiv_id() {
            Some(id) => format!("arXiv:{}", id),
            None => paper
                .paper_id
                .clone()
                .or_else(|| paper.title.clone().filter(|t| !t.trim().is_empty()))?,
        };
        let section = self
            .intents
            .and_then(|intents| intents.into_iter().next())
            .unwrap_or_else(|| DEFAULT_SECTION.to_string());

        Some(CitationRef { reference, section })
    }
}

/// Semantic Scholar paper ids are 40 hex characters
fn is_s2_paper_id(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Path key the Graph API accepts for a canonical id
fn paper_key(id: &str) -> String {
    if is_arxiv_id(id) {
        format!("arXiv:{}", id)
    } else {
        id.to_string()
    }
}

impl SemanticScholarClient {
    pub fn new(config: &ScholarConfig) -> Result<Self, CapabilityError> {
        Ok(Self {
            metadata: Transport::new(
                Capability::Metadata,
                config.timeout_secs,
                config.requests_per_second,
                config.max_retries,
            )?,
            citations: Transport::new(
                Capability::Citations,
                config.timeout_secs,
                config.requests_per_second,
                config.max_retries,
            )?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            reference_limit: config.reference_limit,
        })
    }

    fn get(&self, client: &reqwest::Client, url: &str, query: &[(&str, String)]) -> reqwest::RequestBuilder {
        let builder = client.get(url).query(query);
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn paper_by_key(&self, reference: &str, key: &str) -> Result<Option<S2Paper>, CapabilityError> {
        let url = format!("{}/paper/{}", self.api_base, key);
        let query = [("fields", PAPER_FIELDS.to_string())];
        match self
            .metadata
            .send_json::<S2Paper, _>(reference, |client| self.get(client, &url, &query))
            .await
        {
            Ok(paper) => Ok(Some(paper)),
            Err(CapabilityError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn paper_by_title(&self, title: &str) -> Result<Option<S2Paper>, CapabilityError> {
        let url = format!("{}/paper/search/match", self.api_base);
        let query = [
            ("query", title.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        match self
            .metadata
            .send_json::<S2Match, _>(title, |client| self.get(client, &url, &query))
            .await
        {
            Ok(found) => Ok(found.data.into_iter().next()),
            Err(CapabilityError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl MetadataResolver for SemanticScholarClient {
    #[tracing::instrument(skip(self), fields(capability = "metadata"))]
    async fn resolve(&self, reference: &str) -> Result<Option<PaperMetadata>, CapabilityError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(None);
        }

        let paper = if let Some(id) = arxiv_id_from_text(reference) {
            self.paper_by_key(reference, &format!("arXiv:{}", id)).await?
        } else if is_s2_paper_id(reference) {
            self.paper_by_key(reference, reference).await?
        } else {
            self.paper_by_title(reference).await?
        };

        Ok(paper.and_then(S2Paper::into_metadata))
    }
}

#[async_trait]
impl CitationSource for SemanticScholarClient {
    #[tracing::instrument(skip(self), fields(capability = "citations"))]
    async fn citations(&self, paper_id: &str) -> Result<Vec<CitationRef>, CapabilityError> {
        let url = format!("{}/paper/{}/references", self.api_base, paper_key(paper_id));
        let query = [
            ("fields", REFERENCE_FIELDS.to_string()),
            ("limit", self.reference_limit.to_string()),
        ];

        let references: S2References = self
            .citations
            .send_json(paper_id, |client| self.get(client, &url, &query))
            .await?;

        let refs: Vec<CitationRef> = references
            .data
            .into_iter()
            .filter_map(S2Reference::into_citation)
            .collect();

        tracing::debug!(paper_id = %paper_id, count = refs.len(), "Fetched references");
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_prefers_arxiv_id() {
        let body = r#"{
            "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
            "title": "Attention Is All You Need",
            "authors": [{"authorId": "1", "name": "Ashish Vaswani"}, {"authorId": "2", "name": null}],
            "abstract": "The dominant sequence transduction models...",
            "publicationDate": "2017-06-12",
            "externalIds": {"ArXiv": "1706.03762", "DOI": "10.5555/3295222"}
        }"#;
        let paper: S2Paper = serde_json::from_str(body).unwrap();
        let meta = paper.into_metadata().unwrap();
        assert_eq!(meta.id, "1706.03762");
        assert_eq!(meta.authors, vec!["Ashish Vaswani".to_string()]);
        assert_eq!(meta.published, NaiveDate::from_ymd_opt(2017, 6, 12));
    }

    #[test]
    fn test_metadata_falls_back_to_paper_id() {
        let body = r#"{"paperId": "abc123", "title": "A Workshop Paper", "abstract": null}"#;
        let paper: S2Paper = serde_json::from_str(body).unwrap();
        let meta = paper.into_metadata().unwrap();
        assert_eq!(meta.id, "abc123");
        assert!(meta.summary.is_empty());
        assert!(meta.published.is_none());
    }

    #[test]
    fn test_reference_conversion() {
        let body = r#"{"data": [
            {"intents": ["methodology"], "citedPaper": {"paperId": "p1", "title": "T1", "externalIds": {"ArXiv": "2101.00001"}}},
            {"intents": [], "citedPaper": {"paperId": "p2", "title": "T2", "externalIds": {}}},
            {"intents": null, "citedPaper": {"paperId": null, "title": "Untracked Book"}},
            {"intents": null, "citedPaper": {"paperId": null, "title": null}}
        ]}"#;
        let refs: S2References = serde_json::from_str(body).unwrap();
        let refs: Vec<CitationRef> = refs.data.into_iter().filter_map(S2Reference::into_citation).collect();

        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].reference, "arXiv:2101.00001");
        assert_eq!(refs[0].section, "methodology");
        assert_eq!(refs[1].reference, "p2");
        assert_eq!(refs[1].section, DEFAULT_SECTION);
        assert_eq!(refs[2].reference, "Untracked Book");
    }

    #[test]
    fn test_paper_key() {
        assert_eq!(paper_key("2101.00001"), "arXiv:2101.00001");
        assert_eq!(paper_key("649def34f8be52c8b66281af98ae884c09aef38b"), "649def34f8be52c8b66281af98ae884c09aef38b");
        assert!(is_s2_paper_id("649def34f8be52c8b66281af98ae884c09aef38b"));
        assert!(!is_s2_paper_id("Attention Is All You Need"));
    }
}
