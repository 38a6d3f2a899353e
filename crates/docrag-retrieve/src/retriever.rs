use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use docrag_core::config::RetrievalConfig;
use docrag_core::error::{Error, Result};
use docrag_index::SnapshotStore;

use crate::debug::{build_dump, write_dump};
use crate::merge::{RetrievalMerger, RetrievalOutcome};

/// Answers questions against whichever snapshot is active when the query
/// starts. Queries never write, so they can run concurrently with each other
/// and with a reindex.
pub struct Retriever {
    snapshots: Arc<SnapshotStore>,
    merger: RetrievalMerger,
}

impl Retriever {
    pub fn new(snapshots: Arc<SnapshotStore>, config: RetrievalConfig) -> Self {
        Self { snapshots, merger: RetrievalMerger::new(config) }
    }

    pub fn config(&self) -> &RetrievalConfig {
        self.merger.config()
    }

    pub async fn retrieve(&self, question: &str) -> Result<RetrievalOutcome> {
        self.retrieve_k(question, self.config().top_k).await
    }

    pub async fn retrieve_k(&self, question: &str, k: usize) -> Result<RetrievalOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyQuestion);
        }
        let snapshot = self.snapshots.current().ok_or(Error::IndexUnavailable)?;

        let limit = Duration::from_millis(self.config().query_timeout_ms);
        let search_snapshot = snapshot.clone();
        let query = question.to_string();
        let task = tokio::task::spawn_blocking(move || search_snapshot.store().search(&query, k));
        let hits = match tokio::time::timeout(limit, task).await {
            Err(_) => return Err(Error::Timeout(limit)),
            Ok(Err(join)) => return Err(Error::Operation(format!("search task failed: {}", join))),
            Ok(Ok(hits)) => hits?,
        };
        debug!(k, hits = hits.len(), "search returned");

        if let Some(path) = &self.config().debug_dump {
            write_dump(path, &build_dump(question, &hits, &snapshot, self.config().candidate_preview_chars));
        }

        let outcome = self.merger.merge(question, &hits, snapshot.chunks());
        match &outcome {
            RetrievalOutcome::Answer(a) => {
                info!(source = %a.source_document, section = a.section_index, score = a.score, "answered question")
            }
            RetrievalOutcome::NoMatch { .. } => info!("no match for question"),
        }
        Ok(outcome)
    }
}
