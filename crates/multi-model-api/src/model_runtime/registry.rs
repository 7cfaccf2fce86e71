//! The model registry: the result of startup loading, read-only afterwards.
use super::handle::ModelHandle;
use super::types::{LoadStrategy, ModelKind};

/// A successfully loaded model and the strategy that produced it.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub handle: ModelHandle,
    pub strategy: LoadStrategy,
}

/// Holds at most one model for the lifetime of the process.
///
/// A registry either has a model, in which case it serves the endpoints of
/// its kind, or it has none and serves nothing.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    kind: ModelKind,
    loaded: Option<LoadedModel>,
}

impl ModelRegistry {
    pub fn empty(kind: ModelKind) -> Self {
        Self { kind, loaded: None }
    }

    pub fn with_model(kind: ModelKind, handle: ModelHandle, strategy: LoadStrategy) -> Self {
        Self {
            kind,
            loaded: Some(LoadedModel { handle, strategy }),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn supported_endpoints(&self) -> Vec<String> {
        if self.is_loaded() {
            self.kind.endpoints().iter().map(|e| e.to_string()).collect()
        } else {
            Vec::new()
        }
    }

    pub fn supports(&self, endpoint: &str) -> bool {
        self.is_loaded() && self.kind.endpoints().contains(&endpoint)
    }

    pub fn active_strategy(&self) -> Option<LoadStrategy> {
        self.loaded.as_ref().map(|m| m.strategy)
    }

    pub fn loaded(&self) -> Option<&LoadedModel> {
        self.loaded.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_runtime::handle::TextEmbedder;
    use std::sync::Arc;

    struct ZeroEmbedder;

    impl TextEmbedder for ZeroEmbedder {
        fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0; 4]; texts.len()])
        }
    }

    #[test]
    fn test_empty_registry_serves_nothing() {
        let registry = ModelRegistry::empty(ModelKind::Embedding);
        assert!(!registry.is_loaded());
        assert!(registry.supported_endpoints().is_empty());
        assert!(!registry.supports("/embedding"));
        assert_eq!(registry.active_strategy(), None);
        assert_eq!(registry.kind(), ModelKind::Embedding);
    }

    #[test]
    fn test_loaded_registry_serves_its_kind_only() {
        let registry = ModelRegistry::with_model(
            ModelKind::Embedding,
            ModelHandle::Embedder(Arc::new(ZeroEmbedder)),
            LoadStrategy::Transformer,
        );
        assert!(registry.is_loaded());
        assert_eq!(registry.supported_endpoints(), vec!["/embedding".to_string()]);
        assert!(registry.supports("/embedding"));
        assert!(!registry.supports("/v1"));
        assert_eq!(registry.active_strategy(), Some(LoadStrategy::Transformer));
    }
}
