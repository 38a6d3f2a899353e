use anyhow::Result;
use candle_core::{DType, Tensor};

/// Average the token states the mask keeps, then scale each row to unit
/// length: `[B,T,H] x [B,T] -> [B,H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, _tokens, width) = hidden.dims3()?;
    let eps = if hidden.dtype() == DType::F16 { 1e-6 } else { 1e-12 };

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let kept = mask.sum(1)?.maximum(eps)?;
    let mean = summed.broadcast_div(&kept)?;

    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(eps)?;
    let pooled = mean.broadcast_div(&norms)?;
    anyhow::ensure!(pooled.dims() == [batch, width], "pooled shape {:?}", pooled.dims());
    Ok(pooled)
}
