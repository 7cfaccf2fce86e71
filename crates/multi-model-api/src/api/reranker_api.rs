// Reranker API: score documents against a query with the cross-encoder
use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::blocking::{parse_body, run_blocking};
use super::dispatcher;
use super::error::ApiError;
use crate::model_runtime::types::RERANKER_ENDPOINT;
use crate::shared_state::AppState;

#[derive(Debug, Deserialize)]
pub struct RerankRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RerankResponse {
    pub scores: Vec<f32>,
    pub query: String,
    pub documents: Vec<String>,
}

pub async fn rerank(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RerankResponse>, ApiError> {
    dispatcher::ensure_supported(&state.registry, RERANKER_ENDPOINT)?;
    let RerankRequest { query, documents } = parse_body(&body)?;
    info!("Reranking {} document(s)", documents.len());

    let registry = state.registry.clone();
    let (scores, query, documents) = run_blocking(move || {
        let scores = dispatcher::rerank(&registry, RERANKER_ENDPOINT, &query, &documents)?;
        Ok((scores, query, documents))
    })
    .await?;

    Ok(Json(RerankResponse {
        scores,
        query,
        documents,
    }))
}
