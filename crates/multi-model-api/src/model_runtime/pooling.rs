//! Pooling of token-level hidden states into one vector per input.
//!
//! All functions take `hidden` as `[batch, seq_len, hidden_size]` and, where
//! masked, `mask` as `[batch, seq_len]` with 1 for real tokens and 0 for
//! padding. Results are `[batch, hidden_size]`.
use candle_core::{DType, IndexOp, Tensor, D};

use anyhow::Result;

/// Plain average over the sequence dimension, padding included.
pub fn mean_over_sequence(hidden: &Tensor) -> Result<Tensor> {
    Ok(hidden.mean(1)?)
}

/// Average over real tokens only.
pub fn masked_mean(hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let mask = expand_mask(hidden, mask)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9f64, f64::INFINITY)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Hidden state of the first token (`[CLS]`).
pub fn cls_token(hidden: &Tensor) -> Result<Tensor> {
    Ok(hidden.i((.., 0))?.contiguous()?)
}

/// Element-wise maximum over real tokens.
pub fn masked_max(hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let mask = expand_mask(hidden, mask)?;
    // 0 where the token is real, -1e9 where it is padding
    let penalty = mask.affine(1e9, -1e9)?;
    Ok(hidden.broadcast_add(&penalty)?.max(1)?)
}

/// Scales every row to unit L2 norm.
pub fn l2_normalize(pooled: &Tensor) -> Result<Tensor> {
    let norms = pooled
        .sqr()?
        .sum_keepdim(D::Minus1)?
        .sqrt()?
        .clamp(1e-12f64, f64::INFINITY)?;
    Ok(pooled.broadcast_div(&norms)?)
}

/// `[batch, seq_len]` mask as `[batch, seq_len, 1]` in the hidden dtype.
fn expand_mask(hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
    Ok(mask.to_dtype(hidden.dtype())?.unsqueeze(2)?)
}

/// Converts a pooled `[batch, hidden_size]` tensor to rows of f32.
pub fn to_rows(pooled: &Tensor) -> Result<Vec<Vec<f32>>> {
    Ok(pooled.to_dtype(DType::F32)?.to_vec2::<f32>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    /// One input of three tokens, the last being padding.
    fn fixture() -> (Tensor, Tensor) {
        let hidden = Tensor::new(
            &[[[1f32, 2.0], [3.0, 4.0], [100.0, -100.0]]],
            &Device::Cpu,
        )
        .unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &Device::Cpu).unwrap();
        (hidden, mask)
    }

    #[test]
    fn test_mean_over_sequence_includes_padding() {
        let (hidden, _) = fixture();
        let rows = to_rows(&mean_over_sequence(&hidden).unwrap()).unwrap();
        assert!((rows[0][0] - 104.0 / 3.0).abs() < 1e-4);
        assert!((rows[0][1] + 94.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_masked_mean_ignores_padding() {
        let (hidden, mask) = fixture();
        let rows = to_rows(&masked_mean(&hidden, &mask).unwrap()).unwrap();
        assert_eq!(rows, vec![vec![2.0, 3.0]]);
    }

    #[test]
    fn test_cls_token_takes_first_position() {
        let (hidden, _) = fixture();
        let rows = to_rows(&cls_token(&hidden).unwrap()).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn test_masked_max_ignores_padding() {
        let (hidden, mask) = fixture();
        let rows = to_rows(&masked_max(&hidden, &mask).unwrap()).unwrap();
        assert_eq!(rows, vec![vec![3.0, 4.0]]);
    }

    #[test]
    fn test_l2_normalize_produces_unit_rows() {
        let pooled = Tensor::new(&[[3f32, 4.0], [0.0, 2.0]], &Device::Cpu).unwrap();
        let rows = to_rows(&l2_normalize(&pooled).unwrap()).unwrap();
        assert_eq!(rows, vec![vec![0.6, 0.8], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_pooling_keeps_batch_rows() {
        let hidden = Tensor::zeros((4, 5, 8), DType::F32, &Device::Cpu).unwrap();
        let mask = Tensor::ones((4, 5), DType::U32, &Device::Cpu).unwrap();
        assert_eq!(masked_mean(&hidden, &mask).unwrap().dims(), &[4, 8]);
        assert_eq!(mean_over_sequence(&hidden).unwrap().dims(), &[4, 8]);
    }
}
