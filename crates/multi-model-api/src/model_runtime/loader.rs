//! Candle-backed strategy loader and the startup entry point that turns a
//! configuration into a registry.
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::causal_lm_runtime::CausalLm;
use super::cross_encoder_runtime::CrossEncoder;
use super::device::DeviceProfile;
use super::generation::GenerationSettings;
use super::handle::ModelHandle;
use super::registry::ModelRegistry;
use super::sentence_runtime::SentenceEmbedder;
use super::source::{ModelDir, ModelSource};
use super::strategy_chain::{build_registry, plan_attempts, StrategyLoader};
use super::transformer_runtime::TransformerEmbedder;
use super::types::LoadStrategy;
use crate::config::Config;

pub struct CandleLoader {
    device: DeviceProfile,
    max_sequence_length: usize,
    generation: GenerationSettings,
}

impl CandleLoader {
    pub fn new(device: DeviceProfile, max_sequence_length: usize, generation: GenerationSettings) -> Self {
        Self {
            device,
            max_sequence_length,
            generation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DeviceProfile::select(&config.device),
            config.max_sequence_length,
            config.generation.clone(),
        )
    }
}

impl StrategyLoader for CandleLoader {
    fn load(&self, strategy: LoadStrategy, source: &ModelSource) -> Result<ModelHandle> {
        let dir = ModelDir::open(source).with_context(|| format!("cannot open {}", source))?;

        let handle = match strategy {
            LoadStrategy::SentenceTransformer => ModelHandle::Embedder(Arc::new(
                SentenceEmbedder::load(&dir, &self.device, self.max_sequence_length)?,
            )),
            LoadStrategy::Transformer => ModelHandle::Embedder(Arc::new(
                TransformerEmbedder::load(&dir, &self.device, self.max_sequence_length)?,
            )),
            LoadStrategy::CrossEncoder => ModelHandle::Scorer(Arc::new(
                CrossEncoder::load(&dir, &self.device, self.max_sequence_length)?,
            )),
            LoadStrategy::CausalLm => ModelHandle::Generator(Arc::new(CausalLm::load(
                &dir,
                &self.device,
                self.generation.clone(),
            )?)),
        };
        Ok(handle)
    }
}

/// Loads the configured model. Never fails: when every attempt fails the
/// registry is empty and only the informational routes respond.
pub fn load_registry(config: &Config) -> ModelRegistry {
    let loader = CandleLoader::from_config(config);
    info!(
        "Loading {} model from {} on {:?}",
        config.model_type, config.model_path, loader.device.kind
    );
    let attempts = plan_attempts(config.model_type, Path::new(&config.model_path), &config.model_name);
    build_registry(config.model_type, &attempts, &loader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_runtime::fixtures;
    use crate::model_runtime::types::ModelKind;

    #[test]
    fn test_missing_local_directory_fails_every_strategy() {
        let loader = CandleLoader::new(DeviceProfile::cpu(), 512, GenerationSettings::default());
        let source = ModelSource::Local("/definitely/not/a/model".into());
        for strategy in [
            LoadStrategy::SentenceTransformer,
            LoadStrategy::Transformer,
            LoadStrategy::CrossEncoder,
            LoadStrategy::CausalLm,
        ] {
            assert!(loader.load(strategy, &source).is_err());
        }
    }

    #[test]
    fn test_empty_directory_yields_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.model_path = dir.path().to_string_lossy().to_string();
        config.model_name = String::new();
        config.model_type = ModelKind::Reranker;

        let registry = load_registry(&config);
        assert!(!registry.is_loaded());
        assert_eq!(registry.kind(), ModelKind::Reranker);
        assert!(registry.supported_endpoints().is_empty());
    }

    fn config_for(dir: &tempfile::TempDir, kind: ModelKind) -> Config {
        let mut config = Config::default();
        config.model_path = dir.path().to_string_lossy().to_string();
        config.model_name = String::new();
        config.model_type = kind;
        config
    }

    #[test]
    fn test_plain_encoder_falls_through_to_transformer_strategy() {
        let dir = fixtures::bert_model(None);
        let registry = load_registry(&config_for(&dir, ModelKind::Embedding));

        assert_eq!(registry.active_strategy(), Some(LoadStrategy::Transformer));
        assert_eq!(registry.supported_endpoints(), vec!["/embedding".to_string()]);
    }

    #[test]
    fn test_reranker_checkpoint_loads_cross_encoder() {
        let dir = fixtures::bert_model(Some(1));
        let registry = load_registry(&config_for(&dir, ModelKind::Reranker));
        assert_eq!(registry.active_strategy(), Some(LoadStrategy::CrossEncoder));
    }

    #[test]
    fn test_llama_checkpoint_loads_causal_lm() {
        let dir = fixtures::llama_model();
        let registry = load_registry(&config_for(&dir, ModelKind::Llm));
        assert_eq!(registry.active_strategy(), Some(LoadStrategy::CausalLm));
        assert!(registry.supports("/v1"));
    }
}
