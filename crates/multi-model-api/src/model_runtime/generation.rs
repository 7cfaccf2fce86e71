//! Decoding controls for the causal-LM runtime.
use anyhow::Result;
use candle_core::{DType, IndexOp, Tensor};
use candle_transformers::generation::Sampling;
use serde_json::Value;

pub const DEFAULT_MAX_LENGTH: usize = 20;
pub const DEFAULT_SEED: u64 = 299_792_458;

/// Generation parameters. The defaults follow the usual library behaviour
/// of greedy decoding with a total length of 20 tokens, prompt included.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub max_length: usize,
    pub max_new_tokens: Option<usize>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub seed: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            max_new_tokens: None,
            temperature: None,
            top_p: None,
            seed: DEFAULT_SEED,
        }
    }
}

impl GenerationSettings {
    /// Number of tokens to generate for a prompt of `prompt_len` tokens.
    ///
    /// Without an explicit `max_new_tokens` the remaining length budget is
    /// used, and at least one token is generated even when the prompt
    /// already fills it.
    pub fn new_token_budget(&self, prompt_len: usize) -> usize {
        match self.max_new_tokens {
            Some(limit) => limit,
            None => self.max_length.saturating_sub(prompt_len).max(1),
        }
    }

    pub fn sampling(&self) -> Sampling {
        match (self.temperature, self.top_p) {
            (Some(temperature), Some(p)) if temperature > 0.0 && p < 1.0 => {
                Sampling::TopP { p, temperature }
            }
            (Some(temperature), _) if temperature > 0.0 => Sampling::All { temperature },
            _ => Sampling::ArgMax,
        }
    }
}

/// Reads `eos_token_id`, which checkpoints store as a number or a list.
pub fn parse_eos_token_ids(config: &Value) -> Vec<u32> {
    match config.get("eos_token_id") {
        Some(Value::Number(id)) => id.as_u64().map(|id| vec![id as u32]).unwrap_or_default(),
        Some(Value::Array(ids)) => ids
            .iter()
            .filter_map(|id| id.as_u64().map(|id| id as u32))
            .collect(),
        _ => Vec::new(),
    }
}

/// Logits of the final position as a 1-D f32 tensor.
pub fn last_token_logits(logits: &Tensor) -> Result<Tensor> {
    let logits = logits.to_dtype(DType::F32)?;
    let last = match logits.rank() {
        // [vocab]
        1 => logits,
        // [seq, vocab]
        2 => {
            let rows = logits.dim(0)?;
            logits.i(rows.saturating_sub(1))?
        }
        // [batch, seq, vocab]
        3 => {
            let seq_len = logits.dim(1)?;
            logits.i((0, seq_len.saturating_sub(1)))?
        }
        rank => anyhow::bail!("unexpected logits rank {} with dims {:?}", rank, logits.dims()),
    };
    Ok(last)
}
