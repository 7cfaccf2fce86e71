//! Embedding runtime for checkpoints laid out by sentence-transformers.
//!
//! Such checkpoints carry a `modules.json` describing the pipeline applied
//! after the encoder: a pooling module (configured by
//! `<path>/config.json`) and optionally a normalize module. Checkpoints
//! without `modules.json` are left to the plain transformer runtime.
use anyhow::{Context, Result};
use candle_core::Tensor;
use serde::Deserialize;
use tracing::{debug, info};

use super::bert::BertEncoder;
use super::device::DeviceProfile;
use super::handle::TextEmbedder;
use super::pooling;
use super::source::ModelDir;

const MODULES_FILE: &str = "modules.json";
const SENTENCE_CONFIG_FILE: &str = "sentence_bert_config.json";

#[derive(Debug, Clone, Deserialize)]
struct ModuleEntry {
    #[serde(default)]
    path: String,
    #[serde(rename = "type")]
    module_type: String,
}

/// Pipeline stages read from `modules.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceLayout {
    pub pooling_path: Option<String>,
    pub normalize: bool,
}

impl SentenceLayout {
    pub fn parse(modules_json: &str) -> Result<Self> {
        let modules: Vec<ModuleEntry> =
            serde_json::from_str(modules_json).context("invalid modules.json")?;

        let mut layout = SentenceLayout {
            pooling_path: None,
            normalize: false,
        };
        for module in modules {
            if module.module_type.ends_with("Transformer") {
                if !module.path.is_empty() {
                    anyhow::bail!(
                        "transformer module in subdirectory '{}' is not supported",
                        module.path
                    );
                }
            } else if module.module_type.ends_with("Pooling") {
                layout.pooling_path = Some(module.path);
            } else if module.module_type.ends_with("Normalize") {
                layout.normalize = true;
            } else {
                anyhow::bail!("unsupported sentence-transformers module {}", module.module_type);
            }
        }
        Ok(layout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolingMode {
    Cls,
    Max,
    Mean,
}

/// Pooling module configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolingConfig {
    #[serde(default)]
    pub pooling_mode_cls_token: bool,
    #[serde(default)]
    pub pooling_mode_mean_tokens: bool,
    #[serde(default)]
    pub pooling_mode_max_tokens: bool,
    #[serde(default)]
    pub pooling_mode_mean_sqrt_len_tokens: bool,
    #[serde(default)]
    pub pooling_mode_weightedmean_tokens: bool,
    #[serde(default)]
    pub pooling_mode_lasttoken: bool,
}

impl PoolingConfig {
    /// Enabled modes in the order their outputs are concatenated.
    pub fn modes(&self) -> Result<Vec<PoolingMode>> {
        if self.pooling_mode_mean_sqrt_len_tokens
            || self.pooling_mode_weightedmean_tokens
            || self.pooling_mode_lasttoken
        {
            anyhow::bail!("unsupported pooling mode in pooling config");
        }

        let mut modes = Vec::new();
        if self.pooling_mode_cls_token {
            modes.push(PoolingMode::Cls);
        }
        if self.pooling_mode_max_tokens {
            modes.push(PoolingMode::Max);
        }
        if self.pooling_mode_mean_tokens {
            modes.push(PoolingMode::Mean);
        }
        if modes.is_empty() {
            modes.push(PoolingMode::Mean);
        }
        Ok(modes)
    }
}

/// Config file of the pooling module, relative to the model root. An empty
/// module path means the model root itself.
fn pooling_config_file(module_path: &str) -> String {
    let module_path = module_path.trim_matches('/');
    if module_path.is_empty() {
        "config.json".to_string()
    } else {
        format!("{}/config.json", module_path)
    }
}

#[derive(Debug, Deserialize)]
struct SentenceConfig {
    max_seq_length: Option<usize>,
}

pub struct SentenceEmbedder {
    encoder: BertEncoder,
    modes: Vec<PoolingMode>,
    normalize: bool,
}

impl SentenceEmbedder {
    pub fn load(dir: &ModelDir, device: &DeviceProfile, max_sequence_length: usize) -> Result<Self> {
        let layout = SentenceLayout::parse(&dir.read_to_string(MODULES_FILE)?)?;

        let pooling_path = layout
            .pooling_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("modules.json declares no Pooling module"))?;
        let pooling_config = match dir.read_to_string(&pooling_config_file(pooling_path)) {
            Ok(raw) => serde_json::from_str::<PoolingConfig>(&raw).context("invalid pooling config")?,
            Err(e) => {
                debug!("No pooling config ({}), defaulting to mean pooling", e);
                PoolingConfig::default()
            }
        };
        let modes = pooling_config.modes()?;

        let max_length = match dir.read_to_string(SENTENCE_CONFIG_FILE) {
            Ok(raw) => serde_json::from_str::<SentenceConfig>(&raw)
                .context("invalid sentence_bert_config.json")?
                .max_seq_length
                .map_or(max_sequence_length, |len| len.min(max_sequence_length)),
            Err(_) => max_sequence_length,
        };

        let encoder = BertEncoder::load(dir, device, max_length)?;
        info!(
            "Sentence embedder ready: pooling {:?}, normalize {}, dimension {}",
            modes,
            layout.normalize,
            encoder.hidden_size() * modes.len()
        );

        Ok(Self {
            encoder,
            modes,
            normalize: layout.normalize,
        })
    }

    fn pool(&self, hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let mut parts = self
            .modes
            .iter()
            .map(|mode| match mode {
                PoolingMode::Cls => pooling::cls_token(hidden),
                PoolingMode::Max => pooling::masked_max(hidden, mask),
                PoolingMode::Mean => pooling::masked_mean(hidden, mask),
            })
            .collect::<Result<Vec<_>>>()?;
        let pooled = if parts.len() == 1 {
            parts.remove(0)
        } else {
            Tensor::cat(&parts, 1)?
        };

        if self.normalize {
            pooling::l2_normalize(&pooled)
        } else {
            Ok(pooled)
        }
    }
}

impl TextEmbedder for SentenceEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.encoder.forward(texts.to_vec())?;
        let pooled = self.pool(&output.hidden, &output.mask)?;
        pooling::to_rows(&pooled)
    }
}
