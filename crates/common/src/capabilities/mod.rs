//! External capabilities
//!
//! The discovery engine talks to the outside world through four narrow
//! traits:
//! - [`LanguageModel`]: prompt in, text out
//! - [`SearchEngine`]: web search restricted to paper hosts
//! - [`MetadataResolver`]: identifier or title to canonical metadata
//! - [`CitationSource`]: a paper's outbound references
//!
//! HTTP implementations live in the submodules; tests substitute fakes.

mod http;
pub mod llm;
pub mod scholar;
pub mod search;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::models::PaperMetadata;

pub use llm::OpenAiCompatibleClient;
pub use scholar::SemanticScholarClient;
pub use search::SerperSearch;

/// Which capability an error came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Llm,
    Search,
    Metadata,
    Citations,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Llm => "llm",
            Capability::Search => "search",
            Capability::Metadata => "metadata",
            Capability::Citations => "citations",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a capability
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CapabilityError {
    #[error("{capability} unavailable: {message}")]
    Unavailable { capability: Capability, message: String },

    #[error("rate limited by {capability}")]
    RateLimited { capability: Capability },

    #[error("malformed {capability} response: {message}")]
    MalformedResponse { capability: Capability, message: String },

    #[error("{capability} has no record of {reference}")]
    NotFound { capability: Capability, reference: String },
}

impl CapabilityError {
    pub fn unavailable(capability: Capability, message: impl Into<String>) -> Self {
        CapabilityError::Unavailable {
            capability,
            message: message.into(),
        }
    }

    pub fn malformed(capability: Capability, message: impl Into<String>) -> Self {
        CapabilityError::MalformedResponse {
            capability,
            message: message.into(),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            CapabilityError::Unavailable { capability, .. }
            | CapabilityError::RateLimited { capability }
            | CapabilityError::MalformedResponse { capability, .. }
            | CapabilityError::NotFound { capability, .. } => *capability,
        }
    }

    /// Worth retrying after a pause
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::Unavailable { .. } | CapabilityError::RateLimited { .. }
        )
    }
}

/// Generation limits for a single completion
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionConstraints {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionConstraints {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

/// A raw web search result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// One entry of a paper's reference list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRef {
    /// Identifier or title of the cited work, as the source reports it
    pub reference: String,

    /// Section of the citing paper the reference appears in
    pub section: String,
}

/// Prompt-completion capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        constraints: &CompletionConstraints,
    ) -> Result<String, CapabilityError>;
}

/// Web search capability
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// At most `limit` hits for `query`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CapabilityError>;
}

/// Identifier resolution capability
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Canonical metadata for an id, URL or title; `None` when nothing matches
    async fn resolve(&self, reference: &str) -> Result<Option<PaperMetadata>, CapabilityError>;
}

/// Citation capability
#[async_trait]
pub trait CitationSource: Send + Sync {
    /// References made by the paper with canonical id `paper_id`
    async fn citations(&self, paper_id: &str) -> Result<Vec<CitationRef>, CapabilityError>;
}

/// The capability set a discovery run is wired with
#[derive(Clone)]
pub struct Capabilities {
    pub llm: Arc<dyn LanguageModel>,
    pub search: Arc<dyn SearchEngine>,
    pub metadata: Arc<dyn MetadataResolver>,
    pub citations: Arc<dyn CitationSource>,
}

impl Capabilities {
    /// Build the HTTP-backed capability set
    pub fn from_config(config: &AppConfig) -> Result<Self, CapabilityError> {
        if config.llm.api_key.is_none() {
            tracing::warn!("No LLM API key configured; query expansion and scoring will degrade");
        }
        if config.search.api_key.is_none() {
            tracing::warn!("No search API key configured; search requests will fail");
        }

        let scholar = Arc::new(SemanticScholarClient::new(&config.scholar)?);

        Ok(Self {
            llm: Arc::new(OpenAiCompatibleClient::new(&config.llm)?),
            search: Arc::new(SerperSearch::new(&config.search)?),
            metadata: scholar.clone(),
            citations: scholar,
        })
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
