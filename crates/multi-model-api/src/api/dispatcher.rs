//! Endpoint dispatcher
//!
//! Every model route goes through [`ensure_supported`] before its body is
//! read. Supported requests are forwarded to the capability of the loaded
//! model. The functions here are synchronous and are called from a
//! blocking worker.
use std::time::Instant;
use tracing::debug;

use super::error::ApiError;
use crate::metrics;
use crate::model_runtime::handle::ModelHandle;
use crate::model_runtime::registry::{LoadedModel, ModelRegistry};
use crate::model_runtime::types::LoadStrategy;

/// An embedding matrix, its shape and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub shape: [usize; 2],
    pub strategy: LoadStrategy,
}

pub fn ensure_supported(registry: &ModelRegistry, endpoint: &str) -> Result<(), ApiError> {
    if registry.supports(endpoint) {
        return Ok(());
    }
    Err(ApiError::UnsupportedEndpoint {
        kind: registry.kind(),
        endpoint: endpoint.to_string(),
        supported_endpoints: registry.supported_endpoints(),
    })
}

fn loaded_model<'r>(registry: &'r ModelRegistry, endpoint: &str) -> Result<&'r LoadedModel, ApiError> {
    ensure_supported(registry, endpoint)?;
    registry
        .loaded()
        .ok_or_else(|| ApiError::inference("no model loaded"))
}

fn capability_mismatch(model: &LoadedModel, endpoint: &str) -> ApiError {
    ApiError::inference(format!(
        "{} handle cannot serve {}",
        model.handle.capability(),
        endpoint
    ))
}

pub fn embed(registry: &ModelRegistry, endpoint: &str, texts: &[String]) -> Result<EmbeddingOutput, ApiError> {
    let model = loaded_model(registry, endpoint)?;
    let ModelHandle::Embedder(embedder) = &model.handle else {
        return Err(capability_mismatch(model, endpoint));
    };

    if texts.is_empty() {
        return Ok(EmbeddingOutput {
            embeddings: Vec::new(),
            shape: [0, 0],
            strategy: model.strategy,
        });
    }

    let started = Instant::now();
    let embeddings = embedder.embed(texts)?;
    metrics::observe_inference(endpoint, started.elapsed().as_secs_f64());

    if embeddings.len() != texts.len() {
        return Err(ApiError::inference(format!(
            "model returned {} embeddings for {} inputs",
            embeddings.len(),
            texts.len()
        )));
    }
    let cols = embeddings.first().map(Vec::len).unwrap_or(0);
    if embeddings.iter().any(|row| row.len() != cols) {
        return Err(ApiError::inference("embedding rows have different lengths"));
    }
    debug!("Embedded {} text(s) into {} dimensions", embeddings.len(), cols);

    Ok(EmbeddingOutput {
        shape: [embeddings.len(), cols],
        embeddings,
        strategy: model.strategy,
    })
}

/// Scores each document against the query, in input order.
pub fn rerank(
    registry: &ModelRegistry,
    endpoint: &str,
    query: &str,
    documents: &[String],
) -> Result<Vec<f32>, ApiError> {
    let model = loaded_model(registry, endpoint)?;
    let ModelHandle::Scorer(scorer) = &model.handle else {
        return Err(capability_mismatch(model, endpoint));
    };

    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let pairs: Vec<(String, String)> = documents
        .iter()
        .map(|document| (query.to_string(), document.clone()))
        .collect();

    let started = Instant::now();
    let scores = scorer.score(&pairs)?;
    metrics::observe_inference(endpoint, started.elapsed().as_secs_f64());

    if scores.len() != documents.len() {
        return Err(ApiError::inference(format!(
            "model returned {} scores for {} documents",
            scores.len(),
            documents.len()
        )));
    }
    Ok(scores)
}

pub fn generate(registry: &ModelRegistry, endpoint: &str, prompt: &str) -> Result<String, ApiError> {
    let model = loaded_model(registry, endpoint)?;
    let ModelHandle::Generator(generator) = &model.handle else {
        return Err(capability_mismatch(model, endpoint));
    };

    let started = Instant::now();
    let text = generator.generate(prompt)?;
    metrics::observe_inference(endpoint, started.elapsed().as_secs_f64());
    Ok(text)
}
