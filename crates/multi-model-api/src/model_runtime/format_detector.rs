//! Detects checkpoint layout and architecture from the files of a model
use anyhow::{Context, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use super::source::ModelDir;

const SAFETENSORS_INDEX: &str = "model.safetensors.index.json";
const SAFETENSORS_SINGLE: &str = "model.safetensors";
const PYTORCH_SINGLE: &str = "pytorch_model.bin";

/// Weight files backing a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightFiles {
    Safetensors(Vec<PathBuf>),
    Pytorch(PathBuf),
}

impl WeightFiles {
    /// Locates weights, preferring a sharded index, then a single
    /// safetensors file, then a pickled pytorch checkpoint.
    pub fn detect(dir: &ModelDir) -> Result<Self> {
        if let Ok(index_path) = dir.file(SAFETENSORS_INDEX) {
            let raw = std::fs::read_to_string(&index_path)
                .with_context(|| format!("failed to read {}", index_path.display()))?;
            let shards = shard_names(&serde_json::from_str(&raw)?)?;
            let paths = shards
                .iter()
                .map(|shard| dir.file(shard))
                .collect::<Result<Vec<_>>>()?;
            info!("Detected {} safetensors shards in {}", paths.len(), dir);
            return Ok(WeightFiles::Safetensors(paths));
        }

        if let Ok(path) = dir.file(SAFETENSORS_SINGLE) {
            debug!("Detected single safetensors file in {}", dir);
            return Ok(WeightFiles::Safetensors(vec![path]));
        }

        if let Ok(path) = dir.file(PYTORCH_SINGLE) {
            debug!("Detected pytorch checkpoint in {}", dir);
            return Ok(WeightFiles::Pytorch(path));
        }

        anyhow::bail!(
            "no model weights found in {} (expected {}, {} or {})",
            dir,
            SAFETENSORS_INDEX,
            SAFETENSORS_SINGLE,
            PYTORCH_SINGLE
        )
    }

    pub fn var_builder(&self, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
        let vb = match self {
            // SAFETY: the files are memory-mapped read-only and are not
            // modified while the model is alive.
            WeightFiles::Safetensors(paths) => unsafe {
                VarBuilder::from_mmaped_safetensors(paths, dtype, device)?
            },
            WeightFiles::Pytorch(path) => VarBuilder::from_pth(path, dtype, device)?,
        };
        Ok(vb)
    }
}

/// Unique shard file names listed in a safetensors index, sorted.
fn shard_names(index: &Value) -> Result<Vec<String>> {
    let weight_map = index
        .get("weight_map")
        .and_then(|m| m.as_object())
        .ok_or_else(|| anyhow::anyhow!("invalid {}: missing weight_map", SAFETENSORS_INDEX))?;

    let mut shards: Vec<String> = weight_map
        .values()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    shards.sort();
    shards.dedup();

    if shards.is_empty() {
        anyhow::bail!("invalid {}: weight_map lists no shards", SAFETENSORS_INDEX);
    }
    Ok(shards)
}

/// Decoder architectures the causal-LM runtime can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalArchitecture {
    Llama,
    Qwen2,
}

impl CausalArchitecture {
    pub fn from_config(config: &Value) -> Result<Self> {
        let model_type = config
            .get("model_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("config.json has no model_type"))?;

        match model_type {
            "llama" | "mistral" => Ok(CausalArchitecture::Llama),
            "qwen2" => Ok(CausalArchitecture::Qwen2),
            other => anyhow::bail!("unsupported causal LM architecture '{}'", other),
        }
    }
}

/// Whether a config describes an encoder the BERT runtime can load.
pub fn is_bert_family(config: &Value) -> bool {
    match config.get("model_type").and_then(|v| v.as_str()) {
        Some(model_type) => model_type == "bert",
        // older checkpoints omit model_type
        None => true,
    }
}
