use crate::types::{EmbedRole, Paragraph, SourceDocument};

/// External embedding provider.
///
/// Implementations must be deterministic for a fixed `embedder_id` and return
/// vectors of exactly `dim()` components, one per input text, in input order.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `xlmr:multilingual-e5-base:d768`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String], role: EmbedRole) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Decides whether a paragraph opens a new section.
pub trait HeadingClassifier: Send + Sync {
    fn is_heading(&self, paragraph: &Paragraph) -> bool;
}

/// Enumerates the documents currently present in the corpus.
pub trait DocumentSource {
    fn documents(&self) -> anyhow::Result<Vec<SourceDocument>>;
}

impl DocumentSource for Vec<SourceDocument> {
    fn documents(&self) -> anyhow::Result<Vec<SourceDocument>> {
        Ok(self.clone())
    }
}
