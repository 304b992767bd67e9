//! Configuration management for PaperTrail services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Language model capability
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web search capability
    #[serde(default)]
    pub search: SearchConfig,

    /// Metadata and citation capability (Semantic Scholar)
    #[serde(default)]
    pub scholar: ScholarConfig,

    /// Pipeline defaults and ceilings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Inbound rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,

    /// API key
    pub api_key: Option<String>,

    /// Chat model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Outbound requests per second
    #[serde(default = "default_llm_rps")]
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Serper endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Serper API key
    pub api_key: Option<String>,

    /// Site restriction appended to every query
    #[serde(default = "default_site_filter")]
    pub site_filter: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Outbound requests per second
    #[serde(default = "default_search_rps")]
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    /// Semantic Scholar Graph API base URL
    #[serde(default = "default_scholar_api_base")]
    pub api_base: String,

    /// Optional API key (raises the provider's rate limit)
    pub api_key: Option<String>,

    /// Maximum references fetched per paper
    #[serde(default = "default_reference_limit")]
    pub reference_limit: usize,

    /// Request timeout in seconds
    #[serde(default = "default_scholar_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Outbound requests per second
    #[serde(default = "default_scholar_rps")]
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Sub-queries generated per search
    #[serde(default = "default_generated_query_count")]
    pub generated_query_count: usize,

    /// Raw hits requested per sub-query
    #[serde(default = "default_per_query_limit")]
    pub per_query_limit: usize,

    /// Records accepted per search
    #[serde(default = "default_overall_limit")]
    pub overall_limit: usize,

    /// Citation layers expanded by default
    #[serde(default = "default_max_layers")]
    pub max_layers: u32,

    /// New papers accepted per layer
    #[serde(default = "default_per_layer_cap")]
    pub per_layer_cap: usize,

    /// Outbound capability calls in flight per run
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Candidates per scoring prompt
    #[serde(default = "default_score_batch_size")]
    pub score_batch_size: usize,

    /// Extra rewrite attempts when the model under-produces
    #[serde(default = "default_expander_max_retries")]
    pub expander_max_retries: u32,

    /// Upper bound accepted for `concurrency_limit` on submission
    #[serde(default = "default_max_concurrency_limit")]
    pub max_concurrency_limit: usize,

    /// Upper bound accepted for `max_layers` on submission
    #[serde(default = "default_max_layers_limit")]
    pub max_layers_limit: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_llm_api_base() -> String { "https://api.deepseek.com/v1".to_string() }
fn default_llm_model() -> String { "deepseek-chat".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_max_retries() -> u32 { 3 }
fn default_llm_rps() -> u32 { 5 }
fn default_search_endpoint() -> String { "https://google.serper.dev/search".to_string() }
fn default_site_filter() -> Option<String> { Some("arxiv.org".to_string()) }
fn default_search_timeout() -> u64 { 15 }
fn default_search_rps() -> u32 { 5 }
fn default_scholar_api_base() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_reference_limit() -> usize { 100 }
fn default_scholar_timeout() -> u64 { 20 }
fn default_scholar_rps() -> u32 { 1 }
fn default_generated_query_count() -> usize { 5 }
fn default_per_query_limit() -> usize { 10 }
fn default_overall_limit() -> usize { 10 }
fn default_max_layers() -> u32 { 1 }
fn default_per_layer_cap() -> usize { 10 }
fn default_concurrency_limit() -> usize { 4 }
fn default_score_batch_size() -> usize { 10 }
fn default_expander_max_retries() -> u32 { 1 }
fn default_max_concurrency_limit() -> usize { 32 }
fn default_max_layers_limit() -> u32 { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "papertrail".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__DISCOVERY__CONCURRENCY_LIMIT=8
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_api_base(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
            requests_per_second: default_llm_rps(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            site_filter: default_site_filter(),
            timeout_secs: default_search_timeout(),
            max_retries: default_max_retries(),
            requests_per_second: default_search_rps(),
        }
    }
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api_base: default_scholar_api_base(),
            api_key: None,
            reference_limit: default_reference_limit(),
            timeout_secs: default_scholar_timeout(),
            max_retries: default_max_retries(),
            requests_per_second: default_scholar_rps(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            generated_query_count: default_generated_query_count(),
            per_query_limit: default_per_query_limit(),
            overall_limit: default_overall_limit(),
            max_layers: default_max_layers(),
            per_layer_cap: default_per_layer_cap(),
            concurrency_limit: default_concurrency_limit(),
            score_batch_size: default_score_batch_size(),
            expander_max_retries: default_expander_max_retries(),
            max_concurrency_limit: default_max_concurrency_limit(),
            max_layers_limit: default_max_layers_limit(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            scholar: ScholarConfig::default(),
            discovery: DiscoveryConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
