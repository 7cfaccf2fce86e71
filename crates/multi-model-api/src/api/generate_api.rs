// Generation API: continue a prompt with the causal LM
use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::blocking::{parse_body, run_blocking};
use super::dispatcher;
use super::error::ApiError;
use crate::model_runtime::types::GENERATE_ENDPOINT;
use crate::shared_state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub prompt: String,
    pub response: String,
}

/// The response text is the decoded prompt followed by the continuation.
pub async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    dispatcher::ensure_supported(&state.registry, GENERATE_ENDPOINT)?;
    let GenerateRequest { prompt } = parse_body(&body)?;
    info!("Generating for prompt (length: {} chars)", prompt.len());

    let registry = state.registry.clone();
    let (prompt, response) = run_blocking(move || {
        let response = dispatcher::generate(&registry, GENERATE_ENDPOINT, &prompt)?;
        Ok((prompt, response))
    })
    .await?;

    Ok(Json(GenerateResponse { prompt, response }))
}
