//! Serper (Google) web search client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::Transport;
use super::{Capability, CapabilityError, SearchEngine, SearchHit};
use crate::config::SearchConfig;

pub struct SerperSearch {
    transport: Transport,
    endpoint: String,
    api_key: Option<String>,
    site_filter: Option<String>,
}

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, CapabilityError> {
        Ok(Self {
            transport: Transport::new(
                Capability::Search,
                config.timeout_secs,
                config.requests_per_second,
                config.max_retries,
            )?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            site_filter: config.site_filter.clone(),
        })
    }

    fn decorate(&self, query: &str) -> String {
        let mut q = query.trim().to_string();
        if let Some(site) = &self.site_filter {
            q.push_str(&format!(" site:{}", site));
        }
        q
    }
}

#[async_trait]
impl SearchEngine for SerperSearch {
    #[tracing::instrument(skip(self), fields(capability = "search"))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CapabilityError> {
        let q = self.decorate(query);
        let request = SerperRequest { q: &q, num: limit };

        let response: SerperResponse = self
            .transport
            .send_json(query, |client| {
                let builder = client.post(&self.endpoint).json(&request);
                match &self.api_key {
                    Some(key) => builder.header("X-API-KEY", key),
                    None => builder,
                }
            })
            .await?;

        Ok(response
            .organic
            .into_iter()
            .take(limit)
            .map(|o| SearchHit {
                title: o.title,
                url: o.link,
                snippet: o.snippet,
            })
            .collect())
    }
}
