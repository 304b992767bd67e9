//! Paper lookup and inline search handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::instrument;

use crate::AppState;
use papertrail_common::{errors::Result, models::PaperMetadata};
use papertrail_discovery::{DirectSearchRequest, DirectSearchResult};

/// Metadata for one paper; old-style ids keep their slash (`hep-th/9901001`)
#[instrument(skip(state))]
pub async fn get_paper(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PaperMetadata>> {
    Ok(Json(state.service.paper_info(&id).await?))
}

/// Single web search without query rewriting or scoring
#[instrument(skip(state))]
pub async fn direct_search(
    State(state): State<AppState>,
    Query(request): Query<DirectSearchRequest>,
) -> Result<Json<DirectSearchResult>> {
    Ok(Json(state.service.direct_search(request).await?))
}
