//! Embedding-backed vector store.
//!
//! Row `i` of the index is the `i`-th chunk handed to `build`/`add`; callers
//! keep the chunk metadata list in the same order.

use std::sync::Arc;

use docrag_core::error::{Error, Result};
use docrag_core::traits::Embedder;
use docrag_core::types::{Chunk, EmbedRole, SearchHit};
use tracing::debug;

use crate::flat::FlatIndex;

const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Clone)]
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    index: FlatIndex,
    batch_size: usize,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("embedder", &self.embedder.embedder_id())
            .field("len", &self.index.len())
            .finish()
    }
}

impl VectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let dim = embedder.dim();
        Self { embedder, index: FlatIndex::new(dim), batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Wrap vectors that were embedded earlier, in index order.
    pub fn from_vectors(embedder: Arc<dyn Embedder>, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut store = Self::new(embedder);
        store.index.add(vectors)?;
        Ok(store)
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.index.dim()
    }

    /// Replace the index with embeddings of `chunks`, in order.
    pub fn build(&mut self, chunks: &[Chunk]) -> Result<()> {
        let vectors = self.embed_passages(chunks)?;
        let mut index = FlatIndex::new(self.dim());
        index.add(&vectors)?;
        self.index = index;
        Ok(())
    }

    /// Append embeddings of `chunks` after the existing rows.
    pub fn add(&mut self, chunks: &[Chunk]) -> Result<()> {
        let vectors = self.embed_passages(chunks)?;
        self.index.add(&vectors)
    }

    pub fn add_vectors(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        self.index.add(vectors)
    }

    /// Embed chunk texts with the passage role, batch by batch.
    pub fn embed_passages(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            out.extend(self.embed(&texts, EmbedRole::Passage)?);
        }
        Ok(out)
    }

    pub fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(&[query.to_string()], EmbedRole::Query)?
            .pop()
            .ok_or_else(|| Error::Embedding("embedder returned no vector for the query".into()))
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let vector = self.embed_query(query)?;
        let hits = self.index.search(&vector, k)?;
        debug!(k, hits = hits.len(), "vector search");
        Ok(hits)
    }

    pub fn search_vector(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.index.search(vector, k)
    }

    fn embed(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        let vectors = self
            .embedder
            .embed_batch(texts, role)
            .map_err(|e| Error::Embedding(format!("{:#}", e)))?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim()) {
            return Err(Error::DimensionMismatch { expected: self.dim(), actual: bad.len() });
        }
        Ok(vectors)
    }
}
