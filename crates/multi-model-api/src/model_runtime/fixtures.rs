//! Tiny checkpoints written to temporary directories for runtime tests.
//!
//! All fixtures share one word-level tokenizer over the vocabulary below,
//! with `[PAD]` and `[UNK]` as special tokens.
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

use super::source::{ModelDir, ModelSource};

pub const VOCAB: [&str; 8] = ["[PAD]", "[UNK]", "hello", "world", "a", "b", "c", "x"];
pub const HIDDEN_SIZE: usize = 4;
/// Id of "x", the end-of-sequence token of the llama fixture.
pub const LLAMA_EOS: u32 = 7;

pub fn open(dir: &TempDir) -> ModelDir {
    ModelDir::open(&ModelSource::Local(dir.path().to_path_buf())).unwrap()
}

pub fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

pub fn write_tokenizer(dir: &Path) {
    let vocab: serde_json::Map<String, Value> = VOCAB
        .iter()
        .enumerate()
        .map(|(id, token)| (token.to_string(), json!(id)))
        .collect();
    let special = |id: usize| {
        json!({
            "id": id,
            "content": VOCAB[id],
            "single_word": false,
            "lstrip": false,
            "rstrip": false,
            "normalized": false,
            "special": true
        })
    };

    write_json(
        &dir.join("tokenizer.json"),
        &json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [special(0), special(1)],
            "normalizer": null,
            "pre_tokenizer": {"type": "Whitespace"},
            "post_processor": null,
            "decoder": null,
            "model": {"type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]"}
        }),
    );
}

fn bert_config(num_labels: Option<usize>) -> Value {
    let mut config = json!({
        "model_type": "bert",
        "vocab_size": VOCAB.len(),
        "hidden_size": HIDDEN_SIZE,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 8,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.0,
        "max_position_embeddings": 16,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0,
        "position_embedding_type": "absolute",
        "use_cache": true,
        "classifier_dropout": null
    });
    if let Some(labels) = num_labels {
        config["num_labels"] = json!(labels);
    }
    config
}

/// A one-layer BERT with random weights. With `num_labels` the checkpoint
/// also carries a pooler and a classification head.
pub fn bert_model(num_labels: Option<usize>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let config = bert_config(num_labels);
    write_json(&dir.path().join("config.json"), &config);
    write_tokenizer(dir.path());

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let bert_config: BertConfig = serde_json::from_value(config).unwrap();
    BertModel::load(vb.clone(), &bert_config).unwrap();
    if let Some(labels) = num_labels {
        candle_nn::linear(HIDDEN_SIZE, HIDDEN_SIZE, vb.pp("pooler.dense")).unwrap();
        candle_nn::linear(HIDDEN_SIZE, labels, vb.pp("classifier")).unwrap();
    }
    // initial values of some variables are constant, which would make every
    // hidden state identical
    for var in varmap.all_vars() {
        let values = Tensor::randn(0f32, 0.5, var.dims(), &device).unwrap();
        var.set(&values).unwrap();
    }
    varmap.save(dir.path().join("model.safetensors")).unwrap();
    dir
}

/// Row-major `[rows, cols]` matrix with ones at the given positions.
fn sparse_matrix(rows: usize, cols: usize, ones: &[(usize, usize)]) -> Tensor {
    let mut data = vec![0f32; rows * cols];
    for (row, col) in ones {
        data[row * cols + col] = 1.0;
    }
    Tensor::from_vec(data, (rows, cols), &Device::Cpu).unwrap()
}

/// A one-layer llama whose greedy output is fixed by its unembedding.
///
/// Attention and MLP weights are zero and norms are one, so the final hidden
/// state is the one-hot embedding of the current token and the next token
/// is read straight off `lm_head`: hello -> world -> a -> x, where x is EOS.
/// Every other token also maps to x.
pub fn llama_model() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let hidden = VOCAB.len();
    write_json(
        &dir.path().join("config.json"),
        &json!({
            "model_type": "llama",
            "architectures": ["LlamaForCausalLM"],
            "hidden_size": hidden,
            "intermediate_size": hidden,
            "vocab_size": VOCAB.len(),
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "num_key_value_heads": 2,
            "rms_norm_eps": 1e-5,
            "rope_theta": 10000.0,
            "max_position_embeddings": 32,
            "tie_word_embeddings": false,
            "bos_token_id": null,
            "eos_token_id": LLAMA_EOS
        }),
    );
    write_json(
        &dir.path().join("generation_config.json"),
        &json!({"eos_token_id": LLAMA_EOS}),
    );
    write_tokenizer(dir.path());

    let device = Device::Cpu;
    let zeros = || Tensor::zeros((hidden, hidden), DType::F32, &device).unwrap();
    let ones = || Tensor::ones(hidden, DType::F32, &device).unwrap();
    let identity: Vec<(usize, usize)> = (0..hidden).map(|i| (i, i)).collect();
    let mut transitions = vec![(3, 2), (4, 3), (LLAMA_EOS as usize, 4)];
    transitions.extend([0, 1, 5, 6, 7].map(|token| (LLAMA_EOS as usize, token)));

    let mut tensors = HashMap::new();
    tensors.insert("model.embed_tokens.weight".to_string(), sparse_matrix(hidden, hidden, &identity));
    tensors.insert("lm_head.weight".to_string(), sparse_matrix(hidden, hidden, &transitions));
    tensors.insert("model.norm.weight".to_string(), ones());
    let layer = "model.layers.0";
    for norm in ["input_layernorm", "post_attention_layernorm"] {
        tensors.insert(format!("{}.{}.weight", layer, norm), ones());
    }
    for proj in ["q_proj", "k_proj", "v_proj", "o_proj"] {
        tensors.insert(format!("{}.self_attn.{}.weight", layer, proj), zeros());
    }
    for proj in ["gate_proj", "up_proj", "down_proj"] {
        tensors.insert(format!("{}.mlp.{}.weight", layer, proj), zeros());
    }
    candle_core::safetensors::save(&tensors, dir.path().join("model.safetensors")).unwrap();
    dir
}
