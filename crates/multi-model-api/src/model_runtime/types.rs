use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const EMBEDDING_ENDPOINT: &str = "/embedding";
pub const RERANKER_ENDPOINT: &str = "/reranker";
pub const GENERATE_ENDPOINT: &str = "/v1";

/// Kind of model served by this process, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Embedding,
    Reranker,
    Llm,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Embedding => "embedding",
            ModelKind::Reranker => "reranker",
            ModelKind::Llm => "llm",
        }
    }

    /// Endpoints served once a model of this kind is loaded.
    pub fn endpoints(&self) -> &'static [&'static str] {
        match self {
            ModelKind::Embedding => &[EMBEDDING_ENDPOINT],
            ModelKind::Reranker => &[RERANKER_ENDPOINT],
            ModelKind::Llm => &[GENERATE_ENDPOINT],
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "embedding" => Ok(ModelKind::Embedding),
            "reranker" => Ok(ModelKind::Reranker),
            "llm" => Ok(ModelKind::Llm),
            other => Err(anyhow::anyhow!(
                "unsupported model type '{}' (expected embedding, reranker or llm)",
                other
            )),
        }
    }
}

/// The loading technique that produced the active model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// sentence-transformers layout: encoder plus pooling/normalize modules
    SentenceTransformer,
    /// bare encoder checkpoint: tokenizer + base model, mean pooled
    Transformer,
    /// encoder with a sequence classification head scoring text pairs
    CrossEncoder,
    /// decoder-only language model
    CausalLm,
}

impl LoadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStrategy::SentenceTransformer => "sentence_transformer",
            LoadStrategy::Transformer => "transformer",
            LoadStrategy::CrossEncoder => "cross_encoder",
            LoadStrategy::CausalLm => "causal_lm",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parse_is_case_insensitive() {
        assert_eq!("Embedding".parse::<ModelKind>().unwrap(), ModelKind::Embedding);
        assert_eq!(" RERANKER ".parse::<ModelKind>().unwrap(), ModelKind::Reranker);
        assert_eq!("llm".parse::<ModelKind>().unwrap(), ModelKind::Llm);
    }

    #[test]
    fn test_model_kind_parse_rejects_unknown() {
        let err = "classifier".parse::<ModelKind>().unwrap_err();
        assert!(err.to_string().contains("classifier"));
    }

    #[test]
    fn test_each_kind_serves_exactly_one_endpoint() {
        assert_eq!(ModelKind::Embedding.endpoints(), &["/embedding"]);
        assert_eq!(ModelKind::Reranker.endpoints(), &["/reranker"]);
        assert_eq!(ModelKind::Llm.endpoints(), &["/v1"]);
    }

    #[test]
    fn test_strategy_wire_names_match_serde() {
        for strategy in [
            LoadStrategy::SentenceTransformer,
            LoadStrategy::Transformer,
            LoadStrategy::CrossEncoder,
            LoadStrategy::CausalLm,
        ] {
            let json = serde_json::to_value(strategy).unwrap();
            assert_eq!(json, serde_json::Value::String(strategy.as_str().to_string()));
        }
    }
}
