//! Causal language model runtime.
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::{llama, qwen2};
use serde_json::Value;
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::device::DeviceProfile;
use super::format_detector::{CausalArchitecture, WeightFiles};
use super::generation::{last_token_logits, parse_eos_token_ids, GenerationSettings};
use super::handle::TextGenerator;
use super::source::ModelDir;

enum DecoderModel {
    Llama {
        model: llama::Llama,
        config: llama::Config,
        cache: llama::Cache,
    },
    Qwen2(qwen2::ModelForCausalLM),
}

impl DecoderModel {
    /// Drops any KV state left by a previous request.
    fn reset(&mut self, dtype: DType, device: &Device) -> Result<()> {
        match self {
            DecoderModel::Llama { config, cache, .. } => {
                *cache = llama::Cache::new(true, dtype, config, device)?;
            }
            DecoderModel::Qwen2(model) => model.clear_kv_cache(),
        }
        Ok(())
    }

    fn forward(&mut self, input: &Tensor, offset: usize) -> Result<Tensor> {
        let logits = match self {
            DecoderModel::Llama { model, cache, .. } => model.forward(input, offset, cache)?,
            DecoderModel::Qwen2(model) => model.forward(input, offset)?,
        };
        Ok(logits)
    }
}

pub struct CausalLm {
    model: Mutex<DecoderModel>,
    tokenizer: Tokenizer,
    device: Device,
    dtype: DType,
    eos_token_ids: Vec<u32>,
    settings: GenerationSettings,
}

impl CausalLm {
    pub fn load(dir: &ModelDir, device: &DeviceProfile, settings: GenerationSettings) -> Result<Self> {
        let raw_config = dir.read_json("config.json")?;
        let architecture = CausalArchitecture::from_config(&raw_config)?;

        let eos_token_ids = resolve_eos_token_ids(dir, &raw_config);

        let tokenizer_path = dir.file("tokenizer.json")?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {}", tokenizer_path.display(), e))?;

        let dtype = device.decoder_dtype();
        let vb = WeightFiles::detect(dir)?.var_builder(dtype, &device.device)?;

        let model = match architecture {
            CausalArchitecture::Llama => {
                let llama_config: llama::LlamaConfig =
                    serde_json::from_value(raw_config).context("invalid llama config.json")?;
                let config = llama_config.into_config(false);
                let model = llama::Llama::load(vb, &config).context("failed to build llama model")?;
                let cache = llama::Cache::new(true, dtype, &config, &device.device)?;
                DecoderModel::Llama { model, config, cache }
            }
            CausalArchitecture::Qwen2 => {
                let config: qwen2::Config =
                    serde_json::from_value(raw_config).context("invalid qwen2 config.json")?;
                let model = qwen2::ModelForCausalLM::new(&config, vb)
                    .context("failed to build qwen2 model")?;
                DecoderModel::Qwen2(model)
            }
        };

        info!(
            "Loaded {:?} causal LM from {} ({:?}, eos {:?})",
            architecture, dir, dtype, eos_token_ids
        );

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device: device.device.clone(),
            dtype,
            eos_token_ids,
            settings,
        })
    }
}

/// EOS ids from generation_config.json when present, else config.json.
fn resolve_eos_token_ids(dir: &ModelDir, config: &Value) -> Vec<u32> {
    let from_generation_config = dir
        .read_json("generation_config.json")
        .map(|generation| parse_eos_token_ids(&generation))
        .unwrap_or_default();
    if from_generation_config.is_empty() {
        parse_eos_token_ids(config)
    } else {
        from_generation_config
    }
}

impl TextGenerator for CausalLm {
    fn generate(&self, prompt: &str) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {}", e))?;
        let mut tokens = encoding.get_ids().to_vec();
        if tokens.is_empty() {
            anyhow::bail!("prompt produced no tokens");
        }
        let prompt_len = tokens.len();
        let budget = self.settings.new_token_budget(prompt_len);
        let mut sampler = LogitsProcessor::from_sampling(self.settings.seed, self.settings.sampling());

        let mut model = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("causal LM mutex poisoned"))?;
        model.reset(self.dtype, &self.device)?;

        for step in 0..budget {
            // the full prompt on the first step, then only the newest token
            let offset = if step == 0 { 0 } else { tokens.len() - 1 };
            let input = Tensor::new(&tokens[offset..], &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, offset)?;
            let next = sampler.sample(&last_token_logits(&logits)?)?;
            tokens.push(next);
            if self.eos_token_ids.contains(&next) {
                break;
            }
        }
        drop(model);

        debug!(
            "Generated {} token(s) for a {} token prompt",
            tokens.len() - prompt_len,
            prompt_len
        );

        // decodes prompt and continuation together
        self.tokenizer
            .decode(&tokens, true)
            .map_err(|e| anyhow::anyhow!("decoding failed: {}", e))
    }
}
