use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// XLM-RoBERTa pad token id.
pub const PAD_ID: u32 = 1;

/// Encode a batch into `(input_ids, attention_mask)`, both `[B, T]`.
///
/// Each encoding is cut to `max_len` tokens; `T` is the longest of them and
/// shorter rows are padded with `PAD_ID` under a zero mask.
pub fn encode_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let width = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(encodings.len() * width);
    let mut mask = Vec::with_capacity(encodings.len() * width);
    for enc in &encodings {
        let n = enc.get_ids().len().min(max_len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        ids.resize(ids.len() + width - n, PAD_ID);
        mask.resize(mask.len() + width - n, 0);
    }
    let shape = (encodings.len(), width);
    Ok((Tensor::from_vec(ids, shape, device)?, Tensor::from_vec(mask, shape, device)?))
}
