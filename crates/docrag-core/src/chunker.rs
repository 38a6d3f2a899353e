//! Sentence-aware chunking with word overlap; table blocks are never split.

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{word_count, Chunk, Section, TABLE_END, TABLE_START};

const SENTENCE_TERMINALS: &[char] = &['.', '!', '?', ';', '…'];
const CLOSERS: &[char] = &['"', '\'', ')', ']', '»', '”', '’'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Prose(&'a str),
    Table(&'a str),
}

#[derive(Debug)]
struct Piece {
    text: String,
    has_table: bool,
}

pub struct Chunker {
    config: ChunkingConfig,
    cues: Vec<String>,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        let cues = config.table_cues.iter().map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()).collect();
        Ok(Self { config, cues })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split one section's text into ordered chunk strings.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let max_words = self.config.max_words;
        let overlap_words = self.config.overlap_words;
        let mut pieces: Vec<Piece> = Vec::new();

        for segment in split_segments(text) {
            match segment {
                Segment::Prose(prose) => {
                    for words in chunk_words(prose, max_words, overlap_words) {
                        pieces.push(Piece { text: words.join(" "), has_table: false });
                    }
                }
                Segment::Table(table) => {
                    let cued = pieces.last().is_some_and(|prev| !prev.has_table && self.ends_with_cue(&prev.text));
                    if cued {
                        if let Some(prev) = pieces.last_mut() {
                            prev.text.push_str("\n\n");
                            prev.text.push_str(table);
                            prev.has_table = true;
                        }
                    } else {
                        pieces.push(Piece { text: table.to_string(), has_table: true });
                    }
                }
            }
        }

        pieces
            .into_iter()
            .filter(|p| p.has_table || word_count(&p.text) >= self.config.min_words)
            .map(|p| p.text)
            .collect()
    }

    /// Chunk a section into records; `chunk_id` follows emission order.
    pub fn chunk_section(&self, filename: &str, section: &Section) -> Vec<Chunk> {
        self.chunk(&section.text)
            .into_iter()
            .enumerate()
            .map(|(chunk_id, text)| Chunk {
                filename: filename.to_string(),
                section_index: section.order_index,
                section_title: section.title.clone(),
                chunk_id,
                word_count: word_count(&text),
                text,
            })
            .collect()
    }

    pub fn chunk_sections(&self, filename: &str, sections: &[Section]) -> Vec<Chunk> {
        sections.iter().flat_map(|s| self.chunk_section(filename, s)).collect()
    }

    fn ends_with_cue(&self, text: &str) -> bool {
        let tail = text
            .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '.' | ','))
            .to_lowercase();
        self.cues.iter().any(|cue| tail.ends_with(cue.as_str()))
    }
}

/// Isolate sentinel-delimited table blocks from the prose around them.
fn split_segments(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(TABLE_START) {
        let prose = &rest[..start];
        if !prose.trim().is_empty() {
            segments.push(Segment::Prose(prose));
        }
        let after = &rest[start..];
        match after.find(TABLE_END) {
            Some(end) => {
                let stop = end + TABLE_END.len();
                segments.push(Segment::Table(&after[..stop]));
                rest = &after[stop..];
            }
            None => {
                // Unterminated block: keep the remainder whole.
                segments.push(Segment::Table(after.trim_end()));
                rest = "";
            }
        }
    }
    if !rest.trim().is_empty() {
        segments.push(Segment::Prose(rest));
    }
    segments
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(CLOSERS)
        .chars()
        .last()
        .is_some_and(|c| SENTENCE_TERMINALS.contains(&c))
}

/// Sentences as word lists; a sentence is cut every `max_words` words so no
/// unit exceeds the chunk budget.
fn split_sentences(text: &str, max_words: usize) -> Vec<Vec<&str>> {
    let mut sentences = Vec::new();
    let mut current = Vec::new();
    for word in text.split_whitespace() {
        current.push(word);
        if ends_sentence(word) || current.len() == max_words {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Greedy sentence packing. When a sentence would overflow, the running chunk
/// closes and the next one starts with its last `overlap_words` words.
fn chunk_words(text: &str, max_words: usize, overlap_words: usize) -> Vec<Vec<&str>> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for sentence in split_sentences(text, max_words) {
        if !current.is_empty() && current.len() + sentence.len() > max_words {
            let seed = current[current.len().saturating_sub(overlap_words)..].to_vec();
            chunks.push(std::mem::replace(&mut current, seed));
        }
        current.extend(sentence);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max_words: usize, overlap_words: usize) -> Chunker {
        Chunker::new(ChunkingConfig { max_words, overlap_words, min_words: 1, ..ChunkingConfig::default() })
            .expect("chunker")
    }

    fn sentences(n: usize, words_each: usize) -> String {
        (0..n)
            .map(|i| {
                let mut ws: Vec<String> = (0..words_each).map(|j| format!("w{}_{}", i, j)).collect();
                if let Some(last) = ws.last_mut() {
                    last.push('.');
                }
                ws.join(" ")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn four_hundred_words_make_two_overlapping_chunks() {
        let text = sentences(40, 10);
        let chunks = chunker(350, 50).chunk(&text);
        assert_eq!(chunks.len(), 2);
        let first: Vec<&str> = chunks[0].split_whitespace().collect();
        let second: Vec<&str> = chunks[1].split_whitespace().collect();
        assert_eq!(first.len(), 350);
        assert_eq!(&second[..50], &first[first.len() - 50..]);
    }

    #[test]
    fn unpunctuated_run_is_hard_split() {
        let text = vec!["word"; 400].join(" ");
        let chunks = chunker(350, 50).chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(word_count(&chunks[0]), 350);
        assert_eq!(word_count(&chunks[1]), 100);
    }

    #[test]
    fn greek_question_mark_ends_sentence() {
        assert!(ends_sentence("ισχύει;"));
        assert!(ends_sentence("done.\""));
        assert!(!ends_sentence("mid,"));
    }

    #[test]
    fn table_is_its_own_chunk_without_cue() {
        let text = format!("{} {}\n[[TABLE]]\na | b\n[[/TABLE]]\nAfter text here now.", "Intro", "sentence.");
        let chunks = chunker(50, 5).chunk(&text);
        assert_eq!(chunks, vec!["Intro sentence.", "[[TABLE]]\na | b\n[[/TABLE]]", "After text here now."]);
    }

    #[test]
    fn cue_phrase_pulls_table_into_preceding_chunk() {
        let text = "Rates apply, see table below:\n[[TABLE]]\nx | 1\n[[/TABLE]]";
        let chunks = chunker(50, 5).chunk(text);
        assert_eq!(chunks, vec!["Rates apply, see table below:\n\n[[TABLE]]\nx | 1\n[[/TABLE]]"]);
    }

    #[test]
    fn short_prose_is_dropped_but_tables_are_kept() {
        let c = Chunker::new(ChunkingConfig { min_words: 3, ..ChunkingConfig::default() }).expect("chunker");
        let chunks = c.chunk("Hi.\n[[TABLE]]\nz\n[[/TABLE]]");
        assert_eq!(chunks, vec!["[[TABLE]]\nz\n[[/TABLE]]"]);
    }

    #[test]
    fn unterminated_table_is_kept_whole() {
        let segs = split_segments("a [[TABLE]]\nx | y");
        assert_eq!(segs, vec![Segment::Prose("a "), Segment::Table("[[TABLE]]\nx | y")]);
    }

    #[test]
    fn chunk_ids_restart_per_section() {
        let section = Section { title: Some("T".into()), order_index: 3, text: sentences(8, 10), tables: vec![] };
        let chunks = chunker(30, 5).chunk_section("a.docx", &section);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_id, i);
            assert_eq!(c.section_index, 3);
            assert_eq!(c.word_count, word_count(&c.text));
        }
    }

    #[test]
    fn overlap_not_smaller_than_max_is_rejected() {
        assert!(Chunker::new(ChunkingConfig { max_words: 10, overlap_words: 10, ..ChunkingConfig::default() }).is_err());
    }
}
