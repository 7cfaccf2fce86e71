// Embedding API: texts in, one vector per text out
use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::blocking::{parse_body, run_blocking};
use super::dispatcher;
use super::error::ApiError;
use crate::model_runtime::types::EMBEDDING_ENDPOINT;
use crate::shared_state::AppState;

/// `texts` accepts a single string as well as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextsInput {
    One(String),
    Many(Vec<String>),
}

impl TextsInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TextsInput::One(text) => vec![text],
            TextsInput::Many(texts) => texts,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(default)]
    pub texts: Option<TextsInput>,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub shape: [usize; 2],
    pub model_type: String,
}

pub async fn embedding(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    dispatcher::ensure_supported(&state.registry, EMBEDDING_ENDPOINT)?;
    let request: EmbeddingRequest = parse_body(&body)?;
    let texts = request.texts.map(TextsInput::into_vec).unwrap_or_default();
    info!("Embedding {} text(s)", texts.len());

    let registry = state.registry.clone();
    let output = run_blocking(move || dispatcher::embed(&registry, EMBEDDING_ENDPOINT, &texts)).await?;

    Ok(Json(EmbeddingResponse {
        embeddings: output.embeddings,
        shape: output.shape,
        model_type: output.strategy.to_string(),
    }))
}
