//! Per-query dump of the raw hits, for inspecting what the search saw.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use docrag_core::types::SearchHit;
use docrag_index::IndexSnapshot;

use crate::merge::truncate_chars;

#[derive(Debug, Serialize)]
pub struct DebugHit<'a> {
    pub idx: usize,
    pub score: f32,
    pub filename: &'a str,
    pub section_index: usize,
    pub section_title: Option<&'a str>,
    pub chunk_id: usize,
    pub text_preview: String,
}

#[derive(Debug, Serialize)]
pub struct DebugDump<'a> {
    pub query: &'a str,
    pub hits: Vec<DebugHit<'a>>,
    pub vector_count: usize,
}

pub fn build_dump<'a>(
    query: &'a str,
    hits: &[SearchHit],
    snapshot: &'a IndexSnapshot,
    preview_chars: usize,
) -> DebugDump<'a> {
    let hits = hits
        .iter()
        .filter_map(|h| {
            let chunk = snapshot.chunk(h.index)?;
            Some(DebugHit {
                idx: h.index,
                score: h.score,
                filename: &chunk.filename,
                section_index: chunk.section_index,
                section_title: chunk.section_title.as_deref(),
                chunk_id: chunk.chunk_id,
                text_preview: truncate_chars(&chunk.text, preview_chars, "..."),
            })
        })
        .collect();
    DebugDump { query, hits, vector_count: snapshot.store().len() }
}

/// Write the dump as pretty JSON. Failures are logged, never returned.
pub fn write_dump(path: &Path, dump: &DebugDump<'_>) {
    let result = serde_json::to_vec_pretty(dump)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| std::fs::write(path, bytes).map_err(anyhow::Error::from));
    match result {
        Ok(()) => debug!(path = %path.display(), hits = dump.hits.len(), "wrote query debug dump"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not write query debug dump"),
    }
}
