//! Domain types shared by the indexing and retrieval stages.

use serde::{Deserialize, Serialize};

/// Opening sentinel of a rendered table block.
pub const TABLE_START: &str = "[[TABLE]]";
/// Closing sentinel of a rendered table block.
pub const TABLE_END: &str = "[[/TABLE]]";

/// A raw document as enumerated by a [`crate::traits::DocumentSource`].
///
/// `filename` is the unique key (path relative to the documents root);
/// `bytes` is the exact file content used for change detection.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { filename: filename.into(), bytes: bytes.into() }
    }

    /// Hex blake3 digest of the document bytes.
    pub fn content_hash(&self) -> String {
        content_hash(&self.bytes)
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    /// Resolved style name (e.g. `Heading 1`), when the format carries one.
    pub style: Option<String>,
}

impl Paragraph {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), style: None }
    }

    pub fn styled(text: impl Into<String>, style: impl Into<String>) -> Self {
        Self { text: text.into(), style: Some(style.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Render as a sentinel-delimited block: one line per row, cells joined by ` | `.
    pub fn render(&self) -> String {
        let mut out = String::from(TABLE_START);
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect();
            out.push('\n');
            out.push_str(&cells.join(" | "));
        }
        out.push('\n');
        out.push_str(TABLE_END);
        out
    }
}

/// One element of a document's body, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// A titled or untitled span of a document between two headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: Option<String>,
    pub order_index: usize,
    /// Body paragraphs and rendered tables joined by newlines.
    pub text: String,
    /// Rendered table blocks, verbatim as they occur in `text`.
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub content_hash: String,
    pub sections: Vec<Section>,
}

/// The unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub filename: String,
    pub section_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    pub chunk_id: usize,
    pub text: String,
    pub word_count: usize,
}

/// Which side of the asymmetric embedding convention a text is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedRole {
    Query,
    Passage,
}

impl EmbedRole {
    pub fn prefix(self) -> &'static str {
        match self {
            EmbedRole::Query => "query: ",
            EmbedRole::Passage => "passage: ",
        }
    }

    pub fn apply(self, text: &str) -> String {
        format!("{}{}", self.prefix(), text)
    }
}

/// A raw similarity hit: position in the index plus inner-product score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub index: usize,
    pub score: f32,
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
