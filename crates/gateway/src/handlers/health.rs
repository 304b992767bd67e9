//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub tasks: usize,
    pub checks: CapabilityChecks,
}

/// Whether each outbound capability has credentials configured
#[derive(Serialize)]
pub struct CapabilityChecks {
    pub llm: CheckResult,
    pub search: CheckResult,
    pub scholar: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CheckResult {
    fn from_key(key: Option<&String>, note: &str) -> Self {
        match key {
            Some(k) if !k.is_empty() => Self {
                status: "configured".to_string(),
                note: None,
            },
            _ => Self {
                status: "missing_key".to_string(),
                note: Some(note.to_string()),
            },
        }
    }

    fn usable(&self) -> bool {
        self.status == "configured"
    }
}

/// Liveness check - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: papertrail_common::VERSION.to_string(),
    })
}

/// Readiness check - reports capability configuration
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let config = &state.config;
    let checks = CapabilityChecks {
        llm: CheckResult::from_key(
            config.llm.api_key.as_ref(),
            "query expansion falls back to the original query",
        ),
        search: CheckResult::from_key(config.search.api_key.as_ref(), "search tasks will fail"),
        // Semantic Scholar serves keyless clients at a lower rate
        scholar: CheckResult::from_key(config.scholar.api_key.as_ref(), "using the shared public quota"),
    };

    let ready = checks.llm.usable() && checks.search.usable();

    Json(ReadyResponse {
        status: if ready { "ready" } else { "degraded" }.to_string(),
        tasks: state.service.registry().len(),
        checks,
    })
}
