//! Inference seams between the dispatcher and the candle-backed runtimes.
//!
//! Every loaded model is reduced to one of three capabilities. The
//! dispatcher only ever talks to these traits, so it doesn't need to know
//! which loading strategy built the model behind them.
use std::fmt;
use std::sync::Arc;

/// Encodes texts into fixed-size vectors, one row per input.
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Scores (query, document) pairs jointly, one score per pair.
pub trait PairScorer: Send + Sync {
    fn score(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>>;
}

/// Produces a continuation for a prompt.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// The model owned by the registry.
#[derive(Clone)]
pub enum ModelHandle {
    Embedder(Arc<dyn TextEmbedder>),
    Scorer(Arc<dyn PairScorer>),
    Generator(Arc<dyn TextGenerator>),
}

impl ModelHandle {
    pub fn capability(&self) -> &'static str {
        match self {
            ModelHandle::Embedder(_) => "embedder",
            ModelHandle::Scorer(_) => "scorer",
            ModelHandle::Generator(_) => "generator",
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelHandle").field(&self.capability()).finish()
    }
}
