//! Embedding runtime for bare encoder checkpoints: tokenizer plus base
//! model, hidden states averaged over the sequence dimension.
use anyhow::Result;

use super::bert::BertEncoder;
use super::device::DeviceProfile;
use super::handle::TextEmbedder;
use super::pooling;
use super::source::ModelDir;

pub struct TransformerEmbedder {
    encoder: BertEncoder,
}

impl TransformerEmbedder {
    pub fn load(dir: &ModelDir, device: &DeviceProfile, max_sequence_length: usize) -> Result<Self> {
        Ok(Self {
            encoder: BertEncoder::load(dir, device, max_sequence_length)?,
        })
    }
}

impl TextEmbedder for TransformerEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.encoder.forward(texts.to_vec())?;
        // padding positions take part in the average
        let pooled = pooling::mean_over_sequence(&output.hidden)?;
        pooling::to_rows(&pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_runtime::fixtures;

    fn embedder(dir: &tempfile::TempDir) -> TransformerEmbedder {
        TransformerEmbedder::load(&fixtures::open(dir), &DeviceProfile::cpu(), 512).unwrap()
    }

    #[test]
    fn test_ragged_batch_gives_one_row_per_text() {
        let dir = fixtures::bert_model(None);
        let rows = embedder(&dir)
            .embed(&["hello".to_string(), "hello world a b c".to_string()])
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == fixtures::HIDDEN_SIZE));
        assert!(rows.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_embedding_is_stable_across_calls() {
        let dir = fixtures::bert_model(None);
        let embedder = embedder(&dir);
        let texts = vec!["world a".to_string()];
        assert_eq!(embedder.embed(&texts).unwrap(), embedder.embed(&texts).unwrap());
    }

    #[test]
    fn test_empty_batch_skips_the_model() {
        let dir = fixtures::bert_model(None);
        assert!(embedder(&dir).embed(&[]).unwrap().is_empty());
    }
}
