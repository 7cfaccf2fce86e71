//! Cross-encoder runtime: a BERT encoder with a sequence classification
//! head, scoring (query, document) pairs jointly.
use anyhow::{Context, Result};
use candle_core::{IndexOp, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use super::bert::BertEncoder;
use super::device::DeviceProfile;
use super::handle::PairScorer;
use super::pooling;
use super::source::ModelDir;

#[derive(Debug, Default, Deserialize)]
struct ClassifierConfig {
    num_labels: Option<usize>,
    id2label: Option<HashMap<String, String>>,
}

impl ClassifierConfig {
    /// `num_labels`, else the size of `id2label`, else 2.
    fn label_count(&self) -> usize {
        self.num_labels
            .or_else(|| self.id2label.as_ref().map(HashMap::len))
            .filter(|count| *count > 0)
            .unwrap_or(2)
    }
}

pub struct CrossEncoder {
    encoder: BertEncoder,
    pooler: Option<Linear>,
    classifier: Linear,
    num_labels: usize,
}

impl CrossEncoder {
    pub fn load(dir: &ModelDir, device: &DeviceProfile, max_sequence_length: usize) -> Result<Self> {
        let (encoder, vb, raw_config) = BertEncoder::load_with_weights(dir, device, max_sequence_length)?;
        let num_labels = label_count(&raw_config)?;
        let hidden_size = encoder.hidden_size();

        let pooler = match pooler_prefix(&vb) {
            Some(prefix) => Some(
                candle_nn::linear(hidden_size, hidden_size, vb.pp(prefix))
                    .context("failed to load pooler")?,
            ),
            None => None,
        };
        let classifier = candle_nn::linear(hidden_size, num_labels, vb.pp("classifier"))
            .context("failed to load classification head")?;

        info!(
            "Cross-encoder ready: {} label(s), pooler {}",
            num_labels,
            if pooler.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            encoder,
            pooler,
            classifier,
            num_labels,
        })
    }

    fn logits(&self, hidden: &Tensor) -> Result<Tensor> {
        let cls = pooling::cls_token(hidden)?;
        let pooled = match &self.pooler {
            Some(pooler) => pooler.forward(&cls)?.tanh()?,
            None => cls,
        };
        Ok(self.classifier.forward(&pooled)?)
    }
}

fn label_count(raw_config: &Value) -> Result<usize> {
    let config: ClassifierConfig =
        serde_json::from_value(raw_config.clone()).context("invalid classifier config")?;
    Ok(config.label_count())
}

fn pooler_prefix(vb: &VarBuilder) -> Option<&'static str> {
    ["bert.pooler.dense", "pooler.dense"]
        .into_iter()
        .find(|prefix| vb.contains_tensor(&format!("{}.weight", prefix)))
}

/// One score per row: the sigmoid of a single logit, or the probability of
/// the last label when the head has several.
fn scores_from_logits(logits: &Tensor, num_labels: usize) -> Result<Vec<f32>> {
    let scores = if num_labels == 1 {
        candle_nn::ops::sigmoid(logits)?.squeeze(1)?
    } else {
        candle_nn::ops::softmax(logits, D::Minus1)?
            .i((.., num_labels - 1))?
            .contiguous()?
    };
    Ok(scores.to_dtype(candle_core::DType::F32)?.to_vec1::<f32>()?)
}

impl PairScorer for CrossEncoder {
    fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.encoder.forward(pairs.to_vec())?;
        let logits = self.logits(&output.hidden)?;
        scores_from_logits(&logits, self.num_labels)
    }
}
