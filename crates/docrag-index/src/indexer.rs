//! The indexing run: scan, reconcile, embed what changed, persist, publish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use docrag_core::chunker::Chunker;
use docrag_core::config::Settings;
use docrag_core::parser::DocumentParser;
use docrag_core::traits::{DocumentSource, Embedder};

use crate::cache::ChunkCache;
use crate::snapshot::{IndexSnapshot, SnapshotStore, WriteMode};
use crate::store::VectorStore;
use crate::tracker::{ChangeTracker, ChunkSource, PlanKind};

#[derive(Debug, Clone)]
pub struct IndexReport {
    pub kind: PlanKind,
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub unchanged: usize,
    pub embedded_chunks: usize,
    pub total_chunks: usize,
    pub elapsed: Duration,
}

pub struct Indexer {
    tracker: ChangeTracker,
    snapshots: Arc<SnapshotStore>,
    batch_size: usize,
    show_progress: bool,
}

impl Indexer {
    pub fn new(tracker: ChangeTracker, snapshots: Arc<SnapshotStore>) -> Self {
        Self { tracker, snapshots, batch_size: 32, show_progress: false }
    }

    pub fn from_settings(settings: &Settings, snapshots: Arc<SnapshotStore>) -> Result<Self> {
        let parser = DocumentParser::from_config(&settings.parser)?;
        let chunker = Chunker::new(settings.chunking.clone())?;
        Ok(Self::new(ChangeTracker::new(parser, chunker), snapshots).with_batch_size(settings.embedding.batch_size))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    pub async fn run(&self, source: &dyn DocumentSource) -> Result<IndexReport> {
        let started = Instant::now();
        let embedder = self.snapshots.embedder().clone();
        let rows = self.snapshots.read_rows().await?;
        let vector_count = rows.len();
        let mut cache = self.snapshots.read_cache()?;
        // Same count is not enough: an interrupted rebuild can leave rows in a
        // different order than the cache describes.
        let stored: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
        let discarded = !cache.is_empty() && stored != cache.filenames();
        if discarded {
            warn!(cached = cache.total_chunks(), vectors = vector_count, "cache does not describe the stored vectors, discarding it");
            cache = ChunkCache::default();
        }
        let docs = source.documents()?;
        info!(documents = docs.len(), cached = cache.entries.len(), vectors = vector_count, "starting index run");

        let plan = self.tracker.reconcile(&docs, &cache, vector_count, embedder.embedder_id(), embedder.dim());
        // Without a usable cache every document is embedded again and the
        // stored rows are replaced.
        let kind = if discarded { PlanKind::Full } else { plan.kind };
        let mut report = IndexReport {
            kind,
            added: plan.added.clone(),
            changed: plan.changed.clone(),
            deleted: plan.deleted.clone(),
            failed: plan.failed.clone(),
            unchanged: plan.unchanged,
            embedded_chunks: 0,
            total_chunks: cache.total_chunks(),
            elapsed: Duration::ZERO,
        };

        let old_vectors: Vec<Vec<f32>> = match kind {
            PlanKind::Full => Vec::new(),
            _ => rows.into_iter().map(|r| r.vector).collect(),
        };

        if kind == PlanKind::Unchanged {
            if self.snapshots.current().is_none() {
                let store = VectorStore::from_vectors(embedder.clone(), &old_vectors)?;
                self.snapshots.swap(Arc::new(IndexSnapshot::new(cache, store)?));
            }
            report.elapsed = started.elapsed();
            info!(unchanged = report.unchanged, "index is up to date");
            return Ok(report);
        }

        // One embedding pass per fresh document so a failure only costs that document.
        let store = VectorStore::new(embedder.clone()).with_batch_size(self.batch_size);
        let pb = self.progress_bar(plan.chunks_to_embed().len());
        let mut fresh: HashMap<usize, Vec<Vec<f32>>> = HashMap::new();
        for (i, planned) in plan.entries.iter().enumerate() {
            if planned.source != ChunkSource::Fresh {
                continue;
            }
            pb.set_message(planned.entry.filename.clone());
            match store.embed_passages(&planned.entry.chunks) {
                Ok(vectors) => {
                    report.embedded_chunks += vectors.len();
                    fresh.insert(i, vectors);
                }
                Err(e) => {
                    warn!(filename = %planned.entry.filename, error = %e, "embedding failed, skipping document");
                    report.failed.push((planned.entry.filename.clone(), e.to_string()));
                    report.added.retain(|f| *f != planned.entry.filename);
                    report.changed.retain(|f| *f != planned.entry.filename);
                }
            }
            pb.inc(planned.entry.chunks.len() as u64);
        }
        pb.finish_and_clear();

        let mut store = store;
        let mut entries = Vec::with_capacity(plan.entries.len());
        for (i, planned) in plan.entries.into_iter().enumerate() {
            match planned.source {
                ChunkSource::Reused { old_offset } => {
                    let end = old_offset + planned.entry.chunks.len();
                    let Some(vectors) = old_vectors.get(old_offset..end) else {
                        bail!("stored vectors end before position {} needed by {}", end, planned.entry.filename);
                    };
                    store.add_vectors(vectors)?;
                }
                ChunkSource::Fresh => match fresh.remove(&i) {
                    Some(vectors) => store.add_vectors(&vectors)?,
                    None => continue,
                },
            }
            entries.push(planned.entry);
        }

        let mut new_cache = ChunkCache::new(embedder.embedder_id(), embedder.dim());
        new_cache.entries = entries;
        let snapshot = IndexSnapshot::new(new_cache, store)?;
        let mode = match kind {
            PlanKind::Append => WriteMode::Append { from: vector_count },
            _ => WriteMode::Overwrite,
        };
        self.snapshots.save(&snapshot, mode).await?;
        report.total_chunks = snapshot.len();
        self.snapshots.swap(Arc::new(snapshot));

        report.elapsed = started.elapsed();
        info!(
            kind = ?report.kind,
            added = report.added.len(),
            changed = report.changed.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            embedded = report.embedded_chunks,
            total = report.total_chunks,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "index run finished"
        );
        Ok(report)
    }
}
