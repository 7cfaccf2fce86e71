//! Model runtime
//!
//! Loads one locally stored model with candle and exposes it behind the
//! capability traits the HTTP layer calls into.
//!
//! Architecture:
//! - `strategy_chain` runs ordered (strategy, source) attempts and builds the registry
//! - `loader` maps each strategy onto a candle runtime
//! - one runtime per library format: sentence-transformers, plain encoder,
//!   cross-encoder and causal LM
//! - `registry` is the immutable result shared by the request handlers
pub mod types;
pub mod handle;
pub mod source;
pub mod device;
pub mod format_detector;
pub mod pooling;
pub mod bert;
pub mod sentence_runtime;
pub mod transformer_runtime;
pub mod cross_encoder_runtime;
pub mod generation;
pub mod causal_lm_runtime;
pub mod registry;
pub mod strategy_chain;
pub mod loader;
#[cfg(test)]
pub(crate) mod fixtures;

pub use types::{LoadStrategy, ModelKind, EMBEDDING_ENDPOINT, GENERATE_ENDPOINT, RERANKER_ENDPOINT};
pub use handle::{ModelHandle, PairScorer, TextEmbedder, TextGenerator};
pub use source::{normalize_model_identifier, ModelSource};
pub use generation::GenerationSettings;
pub use registry::{LoadedModel, ModelRegistry};
pub use strategy_chain::{build_registry, plan_attempts, run_chain, LoadAttempt, StrategyLoader};
pub use loader::{load_registry, CandleLoader};
