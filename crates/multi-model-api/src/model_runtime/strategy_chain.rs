//! Strategy chain
//!
//! Loading is an ordered list of (strategy, source) attempts. The runner
//! tries them in order and stops at the first one that yields a model. A
//! failing attempt is logged and recorded, never propagated.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{error, info, warn};

use super::handle::ModelHandle;
use super::registry::{LoadedModel, ModelRegistry};
use super::source::{normalize_model_identifier, ModelSource};
use super::types::{LoadStrategy, ModelKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub strategy: LoadStrategy,
    pub source: ModelSource,
}

impl LoadAttempt {
    pub fn new(strategy: LoadStrategy, source: ModelSource) -> Self {
        Self { strategy, source }
    }
}

/// Builds a model for one strategy from one source.
pub trait StrategyLoader {
    fn load(&self, strategy: LoadStrategy, source: &ModelSource) -> anyhow::Result<ModelHandle>;
}

#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub attempt: LoadAttempt,
    pub error: String,
}

#[derive(Debug)]
pub struct ChainOutcome {
    pub loaded: Option<LoadedModel>,
    pub failures: Vec<AttemptFailure>,
}

/// The attempts made for a model kind, in priority order.
///
/// Embeddings try the local path with both libraries, then the normalized
/// model name with both. Rerankers and language models have a single
/// local attempt.
pub fn plan_attempts(kind: ModelKind, model_path: &Path, model_name: &str) -> Vec<LoadAttempt> {
    let local = ModelSource::Local(model_path.to_path_buf());
    match kind {
        ModelKind::Embedding => {
            let mut attempts = vec![
                LoadAttempt::new(LoadStrategy::SentenceTransformer, local.clone()),
                LoadAttempt::new(LoadStrategy::Transformer, local),
            ];
            let identifier = normalize_model_identifier(model_name.trim());
            if identifier.is_empty() {
                warn!("No model name configured, skipping hub load attempts");
            } else {
                attempts.push(LoadAttempt::new(
                    LoadStrategy::SentenceTransformer,
                    ModelSource::Hub(identifier.clone()),
                ));
                attempts.push(LoadAttempt::new(
                    LoadStrategy::Transformer,
                    ModelSource::Hub(identifier),
                ));
            }
            attempts
        }
        ModelKind::Reranker => vec![LoadAttempt::new(LoadStrategy::CrossEncoder, local)],
        ModelKind::Llm => vec![LoadAttempt::new(LoadStrategy::CausalLm, local)],
    }
}

/// Runs attempts in order until one succeeds.
pub fn run_chain(attempts: &[LoadAttempt], loader: &dyn StrategyLoader) -> ChainOutcome {
    let mut failures = Vec::new();

    for (position, attempt) in attempts.iter().enumerate() {
        info!(
            "Load attempt {}/{}: {} from {}",
            position + 1,
            attempts.len(),
            attempt.strategy,
            attempt.source
        );

        let result = catch_unwind(AssertUnwindSafe(|| loader.load(attempt.strategy, &attempt.source)))
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("loader panicked: {}", panic_message(&*panic))));

        match result {
            Ok(handle) => {
                info!("Loaded model with {} from {}", attempt.strategy, attempt.source);
                return ChainOutcome {
                    loaded: Some(LoadedModel {
                        handle,
                        strategy: attempt.strategy,
                    }),
                    failures,
                };
            }
            Err(e) => {
                warn!("{} from {} failed: {:#}", attempt.strategy, attempt.source, e);
                failures.push(AttemptFailure {
                    attempt: attempt.clone(),
                    error: format!("{:#}", e),
                });
            }
        }
    }

    ChainOutcome {
        loaded: None,
        failures,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs the chain and turns its outcome into the process registry.
pub fn build_registry(
    kind: ModelKind,
    attempts: &[LoadAttempt],
    loader: &dyn StrategyLoader,
) -> ModelRegistry {
    let outcome = run_chain(attempts, loader);
    match outcome.loaded {
        Some(model) => {
            info!(
                "Model ready: type {}, strategy {}, endpoints {:?}",
                kind,
                model.strategy,
                kind.endpoints()
            );
            ModelRegistry::with_model(kind, model.handle, model.strategy)
        }
        None => {
            error!(
                "All {} load attempt(s) failed for {} model; serving no model endpoints",
                outcome.failures.len(),
                kind
            );
            for failure in &outcome.failures {
                error!(
                    "  {} from {}: {}",
                    failure.attempt.strategy, failure.attempt.source, failure.error
                );
            }
            ModelRegistry::empty(kind)
        }
    }
}
