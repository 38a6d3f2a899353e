//! Embedding providers.
//!
//! `EmbeddingModel` runs an XLM-RoBERTa encoder (the E5 multilingual family)
//! with candle and masked-mean pooling. `FakeEmbedder` hashes tokens into a
//! fixed-size vector for fast, deterministic tests and development runs.
//! Both apply the `query: ` / `passage: ` role prefixes before encoding.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use docrag_core::config::EmbeddingConfig;
use docrag_core::traits::Embedder;
use docrag_core::types::EmbedRole;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

const DEFAULT_MODEL_DIRS: &[&str] = &["models/multilingual-e5-base", "../models/multilingual-e5-base"];

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        info!(model_dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
        let json: serde_json::Value = serde_json::from_str(&raw_config)?;
        let dim = json
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let model_max = json
            .get("max_position_embeddings")
            .and_then(|v| v.as_u64())
            .map(|n| n.saturating_sub(2) as usize)
            .unwrap_or(max_len);

        let dtype = DType::F32;
        let safetensors = model_dir.join("model.safetensors");
        let vb = if safetensors.exists() {
            // SAFETY: the weights file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], dtype, &device)? }
        } else {
            let weights_path = model_dir.join("pytorch_model.bin");
            let weights = candle_core::pickle::read_all(&weights_path)?;
            let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
            VarBuilder::from_tensors(weights_map, dtype, &device)
        };
        let model = XLMRobertaModel::new(&config, vb)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "model".to_string());
        let id = format!("xlmr:{}:d{}", name, dim);
        info!(embedder_id = %id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len: max_len.min(model_max), id })
    }

    /// One forward pass over the whole batch.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::encode_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("model produced {} dims, expected {}", bad.len(), self.dim));
        }
        let ms = start.elapsed().as_millis() as u64;
        debug!(texts = texts.len(), elapsed_ms = ms, "embedded batch");
        if ms > 500 * texts.len() as u64 {
            warn!(texts = texts.len(), elapsed_ms = ms, "slow embedding");
        }
        Ok(vectors)
    }
}

impl Embedder for EmbeddingModel {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        let prefixed: Vec<String> = texts.iter().map(|t| role.apply(t)).collect();
        self.embed_texts(&prefixed)
    }
}

/// Token-hashing embedder; identical inputs give identical unit vectors and
/// texts sharing words score higher than unrelated ones.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxhash:d{}", dim) }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String], _role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        // Role prefixes are left out so query and passage share a vocabulary.
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn use_fake_from_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.use_fake || use_fake_from_env() {
        info!(dim = config.dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(config.dim)));
    }
    let dir = resolve_model_dir(config.model_dir.as_deref())?;
    Ok(Arc::new(EmbeddingModel::load(&dir, config.max_len)?))
}

fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured {
        if p.exists() { return Ok(p.to_path_buf()); }
        return Err(anyhow!("configured model dir {} does not exist", p.display()));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { debug!(var, dir = %p.display(), "model dir from env"); return Ok(p); }
        }
    }
    DEFAULT_MODEL_DIRS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Could not locate embedding model directory; set embedding.model_dir or APP_MODEL_DIR"))
}
