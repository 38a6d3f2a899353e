//! Immutable serving snapshots and their on-disk form.
//!
//! An [`IndexSnapshot`] pairs the chunk metadata with the vectors it
//! describes. Readers hold an `Arc` to one snapshot for the whole query; a
//! reindex builds a new snapshot and [`SnapshotStore::swap`] publishes it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use docrag_core::error::Error;
use docrag_core::traits::Embedder;
use docrag_core::types::Chunk;
use tracing::{info, warn};

use crate::cache::ChunkCache;
use crate::lance::{self, VectorRow};
use crate::store::VectorStore;

pub const CACHE_FILE: &str = "cache.json";

/// How [`SnapshotStore::save`] writes the vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace every stored row.
    Overwrite,
    /// Add only rows at positions `from..`; earlier rows are already stored.
    Append { from: usize },
}

#[derive(Debug)]
pub struct IndexSnapshot {
    cache: ChunkCache,
    chunks: Vec<Chunk>,
    store: VectorStore,
}

impl IndexSnapshot {
    pub fn new(cache: ChunkCache, store: VectorStore) -> docrag_core::Result<Self> {
        let chunks = cache.metadata();
        if chunks.len() != store.len() {
            return Err(Error::CacheInconsistency { cached: chunks.len(), vectors: store.len() });
        }
        Ok(Self { cache, chunks, store })
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn rows(&self, from: usize) -> Vec<VectorRow> {
        let filenames = self.cache.filenames();
        self.store
            .index()
            .iter()
            .enumerate()
            .skip(from)
            .map(|(position, v)| VectorRow {
                position,
                filename: filenames.get(position).map(|f| f.to_string()).unwrap_or_default(),
                vector: v.to_vec(),
            })
            .collect()
    }
}

/// Owns the index directory and the snapshot currently being served.
pub struct SnapshotStore {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
    active: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self { dir: dir.into(), embedder, active: RwLock::new(None) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    pub fn read_cache(&self) -> Result<ChunkCache> {
        Ok(ChunkCache::load(&self.cache_path())?)
    }

    pub async fn vector_count(&self) -> Result<usize> {
        let conn = lance::open_db(&self.dir).await?;
        lance::count_vectors(&conn, self.embedder.dim()).await
    }

    /// Stored rows in position order.
    pub async fn read_rows(&self) -> Result<Vec<VectorRow>> {
        let conn = lance::open_db(&self.dir).await?;
        lance::read_vectors(&conn, self.embedder.dim()).await
    }

    pub async fn read_vectors(&self) -> Result<Vec<Vec<f32>>> {
        Ok(self.read_rows().await?.into_iter().map(|r| r.vector).collect())
    }

    /// Read the persisted index and make it the active snapshot.
    ///
    /// Returns `None` when nothing has been indexed yet, and
    /// [`Error::EmbedderMismatch`] when the stored vectors came from a
    /// different embedder than this store's.
    pub async fn load(&self) -> Result<Option<Arc<IndexSnapshot>>> {
        if !self.cache_path().exists() {
            return Ok(None);
        }
        let cache = self.read_cache()?;
        let current = self.embedder.embedder_id();
        if !cache.embedder_id.is_empty() && (cache.embedder_id != current || cache.dim != self.embedder.dim()) {
            warn!(built_with = %cache.embedder_id, current, "index was built with another embedder, not serving it");
            return Err(Error::EmbedderMismatch { built_with: cache.embedder_id, current: current.to_string() }.into());
        }
        let vectors = self.read_vectors().await?;
        let store = VectorStore::from_vectors(self.embedder.clone(), &vectors)?;
        let snapshot = Arc::new(IndexSnapshot::new(cache, store)?);
        info!(chunks = snapshot.len(), dir = %self.dir.display(), "loaded index snapshot");
        self.swap(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Persist a snapshot: vectors first, then the cache file.
    pub async fn save(&self, snapshot: &IndexSnapshot, mode: WriteMode) -> Result<()> {
        let conn = lance::open_db(&self.dir).await?;
        let dim = snapshot.store.dim();
        match mode {
            WriteMode::Overwrite => lance::write_vectors(&conn, dim, &snapshot.rows(0), true).await?,
            WriteMode::Append { from } => lance::write_vectors(&conn, dim, &snapshot.rows(from), false).await?,
        }
        snapshot.cache.save(&self.cache_path())?;
        Ok(())
    }

    /// Publish `snapshot`; in-flight readers keep the one they already hold.
    pub fn swap(&self, snapshot: Arc<IndexSnapshot>) -> Option<Arc<IndexSnapshot>> {
        let mut guard = self.active.write().unwrap_or_else(|e| e.into_inner());
        guard.replace(snapshot)
    }

    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
