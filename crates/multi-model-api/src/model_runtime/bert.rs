//! BERT encoder shared by the embedding and cross-encoder runtimes.
use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use serde_json::Value;
use tokenizers::{EncodeInput, Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::device::DeviceProfile;
use super::format_detector::{is_bert_family, WeightFiles};
use super::source::ModelDir;

/// Fields of config.json read alongside the candle config.
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderDims {
    pub hidden_size: usize,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub pad_token_id: Option<u32>,
}

fn default_max_position_embeddings() -> usize {
    512
}

/// Hidden states plus the attention mask they were computed with.
pub struct EncoderOutput {
    /// `[batch, seq_len, hidden_size]`
    pub hidden: Tensor,
    /// `[batch, seq_len]`, 1 for real tokens
    pub mask: Tensor,
}

/// A tokenizer and base model pair.
pub struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dims: EncoderDims,
}

impl BertEncoder {
    pub fn load(dir: &ModelDir, device: &DeviceProfile, max_sequence_length: usize) -> Result<Self> {
        let (encoder, _, _) = Self::load_with_weights(dir, device, max_sequence_length)?;
        Ok(encoder)
    }

    /// Loads the encoder and also returns the weights and raw config so
    /// callers can build extra heads on top.
    pub fn load_with_weights(
        dir: &ModelDir,
        device: &DeviceProfile,
        max_sequence_length: usize,
    ) -> Result<(Self, VarBuilder<'static>, Value)> {
        let raw_config = dir.read_json("config.json")?;
        if !is_bert_family(&raw_config) {
            anyhow::bail!(
                "unsupported encoder architecture {:?} in {}",
                raw_config.get("model_type"),
                dir
            );
        }
        let config: BertConfig =
            serde_json::from_value(raw_config.clone()).context("invalid BERT config.json")?;
        let dims: EncoderDims =
            serde_json::from_value(raw_config.clone()).context("invalid BERT config.json")?;

        let max_length = max_sequence_length.min(dims.max_position_embeddings);
        let tokenizer = load_tokenizer(dir, dims.pad_token_id.unwrap_or(0), max_length)?;

        let weights = WeightFiles::detect(dir)?;
        let vb = weights.var_builder(device.encoder_dtype(), &device.device)?;
        let model = BertModel::load(vb.clone(), &config).context("failed to build BERT model")?;

        info!(
            "Loaded BERT encoder from {} (hidden size {}, max length {})",
            dir, dims.hidden_size, max_length
        );

        let encoder = Self {
            model,
            tokenizer,
            device: device.device.clone(),
            dims,
        };
        Ok((encoder, vb, raw_config))
    }

    pub fn hidden_size(&self) -> usize {
        self.dims.hidden_size
    }

    /// Tokenizes a batch with padding and truncation and runs the encoder.
    ///
    /// The batch must not be empty.
    pub fn forward<'s, E>(&self, inputs: Vec<E>) -> Result<EncoderOutput>
    where
        E: Into<EncodeInput<'s>> + Send,
    {
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {}", e))?;
        if encodings.is_empty() {
            anyhow::bail!("cannot encode an empty batch");
        }
        debug!(
            "Encoding batch of {} (padded length {})",
            encodings.len(),
            encodings[0].get_ids().len()
        );

        let input_ids = stack_field(&encodings, Encoding::get_ids, &self.device)?;
        let type_ids = stack_field(&encodings, Encoding::get_type_ids, &self.device)?;
        let mask = stack_field(&encodings, Encoding::get_attention_mask, &self.device)?;

        let hidden = self.model.forward(&input_ids, &type_ids, Some(&mask))?;
        Ok(EncoderOutput { hidden, mask })
    }
}

fn load_tokenizer(dir: &ModelDir, pad_id: u32, max_length: usize) -> Result<Tokenizer> {
    let path = dir.file("tokenizer.json")?;
    let mut tokenizer = Tokenizer::from_file(&path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", path.display(), e))?;

    let pad_token = tokenizer
        .id_to_token(pad_id)
        .unwrap_or_else(|| "[PAD]".to_string());
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token,
        ..Default::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("invalid truncation settings: {}", e))?;

    Ok(tokenizer)
}

fn stack_field(
    encodings: &[Encoding],
    field: fn(&Encoding) -> &[u32],
    device: &Device,
) -> Result<Tensor> {
    let rows = encodings
        .iter()
        .map(|encoding| Tensor::new(field(encoding), device))
        .collect::<candle_core::Result<Vec<_>>>()?;
    Ok(Tensor::stack(&rows, 0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_runtime::fixtures;
    use serde_json::json;

    #[test]
    fn test_encoder_dims_defaults() {
        let dims: EncoderDims = serde_json::from_value(json!({"hidden_size": 384})).unwrap();
        assert_eq!(dims.hidden_size, 384);
        assert_eq!(dims.max_position_embeddings, 512);
        assert_eq!(dims.pad_token_id, None);
    }

    #[test]
    fn test_forward_pads_and_truncates_batch() {
        let dir = fixtures::bert_model(None);
        let encoder = BertEncoder::load(&fixtures::open(&dir), &DeviceProfile::cpu(), 3).unwrap();

        let output = encoder
            .forward(vec!["hello world a b".to_string(), "x".to_string()])
            .unwrap();

        assert_eq!(output.hidden.dims(), &[2, 3, fixtures::HIDDEN_SIZE]);
        let mask = output.mask.to_vec2::<u32>().unwrap();
        assert_eq!(mask, vec![vec![1, 1, 1], vec![1, 0, 0]]);
    }

    #[test]
    fn test_sequence_limit_capped_by_position_embeddings() {
        let dir = fixtures::bert_model(None);
        let encoder = BertEncoder::load(&fixtures::open(&dir), &DeviceProfile::cpu(), 512).unwrap();

        let long_text = vec!["a"; 40].join(" ");
        let output = encoder.forward(vec![long_text]).unwrap();
        assert_eq!(output.hidden.dims(), &[1, 16, fixtures::HIDDEN_SIZE]);
    }

    #[test]
    fn test_load_rejects_other_encoder_architectures() {
        let dir = fixtures::bert_model(None);
        fixtures::write_json(
            &dir.path().join("config.json"),
            &json!({"model_type": "xlm-roberta", "hidden_size": 4}),
        );
        let err = BertEncoder::load(&fixtures::open(&dir), &DeviceProfile::cpu(), 8)
            .err()
            .unwrap();
        assert!(err.to_string().contains("xlm-roberta"));
    }
}
