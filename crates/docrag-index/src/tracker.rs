//! Content-hash change detection against the chunk cache.
//!
//! `reconcile` decides, per document, whether the cached chunks can be reused
//! verbatim or the document must go through parse and chunk again, and picks
//! the cheapest index update that keeps vector `i` aligned with chunk `i`.

use std::collections::{BTreeMap, HashMap};

use docrag_core::chunker::Chunker;
use docrag_core::parser::DocumentParser;
use docrag_core::types::{Chunk, SourceDocument};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, ChunkCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Nothing to do.
    Unchanged,
    /// Only new documents; their vectors go after the existing rows.
    Append,
    /// A document changed or disappeared; rebuild from surviving vectors.
    Compact,
    /// Cache cannot be trusted; re-embed everything.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    /// Vectors already stored, starting at `old_offset` in the current index.
    Reused { old_offset: usize },
    /// Chunks that still need embedding.
    Fresh,
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub entry: CacheEntry,
    pub source: ChunkSource,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub kind: PlanKind,
    /// Entries in their new index order.
    pub entries: Vec<PlannedEntry>,
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    /// Documents that could not be parsed, with the reason.
    pub failed: Vec<(String, String)>,
    pub unchanged: usize,
    pub forced_full: bool,
}

impl Reconciliation {
    pub fn chunks_to_embed(&self) -> Vec<&Chunk> {
        self.entries
            .iter()
            .filter(|p| p.source == ChunkSource::Fresh)
            .flat_map(|p| p.entry.chunks.iter())
            .collect()
    }

    pub fn metadata(&self) -> Vec<Chunk> {
        self.entries.iter().flat_map(|p| p.entry.chunks.iter().cloned()).collect()
    }

    pub fn into_cache(self, embedder_id: &str, dim: usize) -> ChunkCache {
        let mut cache = ChunkCache::new(embedder_id, dim);
        cache.entries = self.entries.into_iter().map(|p| p.entry).collect();
        cache
    }
}

pub struct ChangeTracker {
    parser: DocumentParser,
    chunker: Chunker,
}

impl ChangeTracker {
    pub fn new(parser: DocumentParser, chunker: Chunker) -> Self {
        Self { parser, chunker }
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Compare the present documents with the cache.
    ///
    /// `vector_count` is the number of rows in the stored index; when it does
    /// not match the cache, or the embedder changed, the cache is ignored.
    pub fn reconcile(
        &self,
        sources: &[SourceDocument],
        cache: &ChunkCache,
        vector_count: usize,
        embedder_id: &str,
        dim: usize,
    ) -> Reconciliation {
        let cached_total = cache.total_chunks();
        let embedder_changed = !cache.is_empty() && (cache.embedder_id != embedder_id || cache.dim != dim);
        let forced_full = vector_count != cached_total || embedder_changed;
        if forced_full {
            warn!(
                cached = cached_total,
                vectors = vector_count,
                embedder_changed,
                "cache does not match the vector index, rebuilding everything"
            );
        }

        let present: BTreeMap<&str, &SourceDocument> =
            sources.iter().map(|d| (d.filename.as_str(), d)).collect();
        let hashes: HashMap<&str, String> = present.iter().map(|(name, d)| (*name, d.content_hash())).collect();

        let mut entries = Vec::new();
        let mut changed = Vec::new();
        let mut deleted = Vec::new();
        let mut unchanged = 0usize;

        if !forced_full {
            for (entry, old_offset) in cache.entries.iter().zip(cache.offsets()) {
                match hashes.get(entry.filename.as_str()) {
                    Some(hash) if *hash == entry.content_hash => {
                        entries.push(PlannedEntry { entry: entry.clone(), source: ChunkSource::Reused { old_offset } });
                        unchanged += 1;
                    }
                    Some(_) => changed.push(entry.filename.clone()),
                    None => deleted.push(entry.filename.clone()),
                }
            }
        }
        let survivors = entries.len();

        let mut added = Vec::new();
        let mut failed = Vec::new();
        for (name, doc) in &present {
            if entries[..survivors].iter().any(|p| p.entry.filename == *name) {
                continue;
            }
            let is_changed = changed.iter().any(|c| c == name);
            match self.parser.parse(doc) {
                Ok(parsed) => {
                    let chunks = self.chunker.chunk_sections(&parsed.filename, &parsed.sections);
                    debug!(filename = %name, sections = parsed.sections.len(), chunks = chunks.len(), "chunked document");
                    let hash = hashes.get(name).cloned().unwrap_or_default();
                    entries.push(PlannedEntry { entry: CacheEntry::new(*name, hash, chunks), source: ChunkSource::Fresh });
                    if !is_changed {
                        added.push(name.to_string());
                    }
                }
                Err(e) => {
                    warn!(filename = %name, error = %e, "skipping document");
                    failed.push((name.to_string(), e.to_string()));
                }
            }
        }
        changed.retain(|c| !failed.iter().any(|(f, _)| f == c));

        let kind = if forced_full {
            PlanKind::Full
        } else if survivors < cache.entries.len() {
            PlanKind::Compact
        } else if entries.len() > survivors {
            PlanKind::Append
        } else {
            PlanKind::Unchanged
        };

        Reconciliation { kind, entries, added, changed, deleted, failed, unchanged, forced_full }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::config::{ChunkingConfig, ParserConfig};

    fn tracker() -> ChangeTracker {
        let parser = DocumentParser::from_config(&ParserConfig::default()).unwrap();
        let chunker = Chunker::new(ChunkingConfig { min_words: 1, ..ChunkingConfig::default() }).unwrap();
        ChangeTracker::new(parser, chunker)
    }

    fn doc(name: &str, body: &str) -> SourceDocument {
        SourceDocument::new(name, body.as_bytes().to_vec())
    }

    fn first_run(t: &ChangeTracker, docs: &[SourceDocument]) -> ChunkCache {
        let plan = t.reconcile(docs, &ChunkCache::default(), 0, "fake", 8);
        plan.into_cache("fake", 8)
    }

    #[test]
    fn empty_cache_adds_everything() {
        let t = tracker();
        let docs = vec![doc("b.txt", "Beta text here."), doc("a.txt", "Alpha text here.")];
        let plan = t.reconcile(&docs, &ChunkCache::default(), 0, "fake", 8);
        assert_eq!(plan.kind, PlanKind::Append);
        assert_eq!(plan.added, vec!["a.txt", "b.txt"]);
        assert_eq!(plan.chunks_to_embed().len(), 2);
        assert_eq!(plan.metadata()[0].filename, "a.txt");
    }

    #[test]
    fn identical_documents_are_unchanged() {
        let t = tracker();
        let docs = vec![doc("a.txt", "Alpha text here.")];
        let cache = first_run(&t, &docs);
        let plan = t.reconcile(&docs, &cache, cache.total_chunks(), "fake", 8);
        assert_eq!(plan.kind, PlanKind::Unchanged);
        assert!(plan.chunks_to_embed().is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn changed_document_moves_to_the_end() {
        let t = tracker();
        let docs = vec![doc("a.txt", "Alpha text here."), doc("b.txt", "Beta text here.")];
        let cache = first_run(&t, &docs);
        let docs = vec![doc("a.txt", "Alpha text rewritten."), doc("b.txt", "Beta text here.")];
        let plan = t.reconcile(&docs, &cache, 2, "fake", 8);
        assert_eq!(plan.kind, PlanKind::Compact);
        assert_eq!(plan.changed, vec!["a.txt"]);
        assert_eq!(plan.entries[0].entry.filename, "b.txt");
        assert_eq!(plan.entries[0].source, ChunkSource::Reused { old_offset: 1 });
        assert_eq!(plan.entries[1].source, ChunkSource::Fresh);
        assert_eq!(plan.chunks_to_embed()[0].text, "Alpha text rewritten.");
    }

    #[test]
    fn removed_document_is_deleted() {
        let t = tracker();
        let docs = vec![doc("a.txt", "Alpha text here."), doc("b.txt", "Beta text here.")];
        let cache = first_run(&t, &docs);
        let plan = t.reconcile(&docs[1..], &cache, 2, "fake", 8);
        assert_eq!(plan.kind, PlanKind::Compact);
        assert_eq!(plan.deleted, vec!["a.txt"]);
        assert_eq!(plan.metadata().len(), 1);
    }

    #[test]
    fn count_mismatch_forces_full_rebuild() {
        let t = tracker();
        let docs = vec![doc("a.txt", "Alpha text here.")];
        let cache = first_run(&t, &docs);
        let plan = t.reconcile(&docs, &cache, 0, "fake", 8);
        assert_eq!(plan.kind, PlanKind::Full);
        assert!(plan.forced_full);
        assert_eq!(plan.chunks_to_embed().len(), 1);
    }

    #[test]
    fn new_embedder_forces_full_rebuild() {
        let t = tracker();
        let docs = vec![doc("a.txt", "Alpha text here.")];
        let cache = first_run(&t, &docs);
        let plan = t.reconcile(&docs, &cache, 1, "other", 8);
        assert_eq!(plan.kind, PlanKind::Full);
    }

    #[test]
    fn unparseable_document_is_skipped_and_its_stale_entry_dropped() {
        let t = tracker();
        let docs = vec![doc("a.txt", "Alpha text here."), doc("b.docx", "placeholder")];
        let plan = t.reconcile(&docs, &ChunkCache::default(), 0, "fake", 8);
        assert_eq!(plan.failed.len(), 1);
        assert_eq!(plan.failed[0].0, "b.docx");
        assert_eq!(plan.entries.len(), 1);
    }
}
