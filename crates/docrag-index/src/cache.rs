//! The chunk cache persisted between indexing runs as `cache.json`.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use docrag_core::error::Result;
use docrag_core::types::Chunk;

pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub filename: String,
    pub content_hash: String,
    pub chunks: Vec<Chunk>,
    /// RFC 3339 time the chunks were produced.
    pub indexed_at: String,
}

impl CacheEntry {
    pub fn new(filename: impl Into<String>, content_hash: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            filename: filename.into(),
            content_hash: content_hash.into(),
            chunks,
            indexed_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Entries are stored in index order: flattening their chunks gives the
/// metadata list whose `i`-th element describes vector `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkCache {
    pub version: u32,
    pub embedder_id: String,
    pub dim: usize,
    pub entries: Vec<CacheEntry>,
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self { version: CACHE_VERSION, embedder_id: String::new(), dim: 0, entries: Vec::new() }
    }
}

impl ChunkCache {
    pub fn new(embedder_id: impl Into<String>, dim: usize) -> Self {
        Self { embedder_id: embedder_id.into(), dim, ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_chunks(&self) -> usize {
        self.entries.iter().map(|e| e.chunks.len()).sum()
    }

    pub fn entry(&self, filename: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Starting vector position of each entry.
    pub fn offsets(&self) -> Vec<usize> {
        let mut next = 0;
        self.entries
            .iter()
            .map(|e| {
                let start = next;
                next += e.chunks.len();
                start
            })
            .collect()
    }

    pub fn metadata(&self) -> Vec<Chunk> {
        self.entries.iter().flat_map(|e| e.chunks.iter().cloned()).collect()
    }

    /// Filename owning each vector position.
    pub fn filenames(&self) -> Vec<&str> {
        self.entries
            .iter()
            .flat_map(|e| std::iter::repeat(e.filename.as_str()).take(e.chunks.len()))
            .collect()
    }

    /// Read a cache file; a missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write through a temp file and rename so readers never see a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
