//! Section parsing: heading classification and the block → section scan.

use regex::Regex;

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::loader::load_blocks;
use crate::traits::HeadingClassifier;
use crate::types::{Block, Document, Paragraph, Section, SourceDocument};

/// Headings marked explicitly by paragraph style.
pub struct StyleClassifier {
    prefixes: Vec<String>,
}

impl StyleClassifier {
    pub fn new(prefixes: &[String]) -> Self {
        Self { prefixes: prefixes.iter().map(|p| p.to_lowercase()).collect() }
    }
}

impl HeadingClassifier for StyleClassifier {
    fn is_heading(&self, paragraph: &Paragraph) -> bool {
        let Some(style) = paragraph.style.as_deref() else { return false };
        let style = style.to_lowercase();
        self.prefixes.iter().any(|p| style.starts_with(p.as_str()))
    }
}

/// Fallback headings recognized by their text (numbered clauses, "Article N", ...).
pub struct PatternClassifier {
    patterns: Vec<Regex>,
    max_words: usize,
}

impl PatternClassifier {
    pub fn new(patterns: &[String], max_words: usize) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidConfig(format!("bad heading pattern '{}': {}", p, e))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns, max_words })
    }
}

impl HeadingClassifier for PatternClassifier {
    fn is_heading(&self, paragraph: &Paragraph) -> bool {
        let text = paragraph.text.trim();
        if text.is_empty() || text.contains('\n') || text.split_whitespace().count() > self.max_words {
            return false;
        }
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

/// A heading if any inner classifier says so.
pub struct AnyOf(pub Vec<Box<dyn HeadingClassifier>>);

impl HeadingClassifier for AnyOf {
    fn is_heading(&self, paragraph: &Paragraph) -> bool {
        self.0.iter().any(|c| c.is_heading(paragraph))
    }
}

pub fn default_classifier(config: &ParserConfig) -> Result<Box<dyn HeadingClassifier>> {
    Ok(Box::new(AnyOf(vec![
        Box::new(StyleClassifier::new(&config.heading_styles)),
        Box::new(PatternClassifier::new(&config.heading_patterns, config.max_heading_words)?),
    ])))
}

pub struct DocumentParser {
    classifier: Box<dyn HeadingClassifier>,
}

#[derive(Default)]
struct Accumulator {
    title: Option<String>,
    body: Vec<String>,
    tables: Vec<String>,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_empty()
    }

    fn into_section(self, order_index: usize) -> Section {
        Section { title: self.title, order_index, text: self.body.join("\n"), tables: self.tables }
    }
}

impl DocumentParser {
    pub fn new(classifier: Box<dyn HeadingClassifier>) -> Self {
        Self { classifier }
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        Ok(Self::new(default_classifier(config)?))
    }

    /// Load and parse a source document.
    pub fn parse(&self, doc: &SourceDocument) -> Result<Document> {
        let blocks = load_blocks(doc)?;
        Ok(Document {
            filename: doc.filename.clone(),
            content_hash: doc.content_hash(),
            sections: self.parse_blocks(&blocks),
        })
    }

    /// Scan blocks in order; each heading closes the running section and opens
    /// the next. Tables are rendered and appended whole to the running section.
    pub fn parse_blocks(&self, blocks: &[Block]) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current = Accumulator::default();

        for block in blocks {
            match block {
                Block::Paragraph(p) => {
                    let text = p.text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if self.classifier.is_heading(p) {
                        let done = std::mem::take(&mut current);
                        if !done.is_empty() {
                            sections.push(done.into_section(sections.len()));
                        }
                        current.title = Some(text.to_string());
                    } else {
                        current.body.push(text.to_string());
                    }
                }
                Block::Table(t) => {
                    if t.rows.is_empty() {
                        continue;
                    }
                    let rendered = t.render();
                    current.body.push(rendered.clone());
                    current.tables.push(rendered);
                }
            }
        }
        if !current.is_empty() {
            sections.push(current.into_section(sections.len()));
        }
        sections
    }
}
