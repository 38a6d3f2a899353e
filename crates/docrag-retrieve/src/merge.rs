//! Turning raw chunk hits into ranked, readable sections.

use serde::Serialize;
use tracing::warn;

use docrag_core::config::RetrievalConfig;
use docrag_core::types::{Chunk, SearchHit, TABLE_END, TABLE_START};

/// Hits from one section, stitched back together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSection {
    pub filename: String,
    pub section_index: usize,
    pub section_title: Option<String>,
    /// Mean score of the member chunks.
    pub score: f32,
    pub chunk_ids: Vec<usize>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer_text: String,
    pub source_document: String,
    pub section_index: usize,
    pub section_title: Option<String>,
    pub score: f32,
    pub candidates: Vec<RankedSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrievalOutcome {
    Answer(Answer),
    /// The search returned nothing; never dressed up as an answer.
    NoMatch { question: String, message: String },
}

impl RetrievalOutcome {
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            RetrievalOutcome::Answer(a) => Some(a),
            RetrievalOutcome::NoMatch { .. } => None,
        }
    }
}

struct Group<'a> {
    filename: &'a str,
    section_index: usize,
    section_title: Option<&'a str>,
    members: Vec<(&'a Chunk, f32)>,
}

/// Group hits by `(filename, section_index)` and rank the groups.
///
/// Groups appear in order of their first hit; sorting is stable so equal
/// scores keep that order.
pub fn rank_sections(hits: &[SearchHit], chunks: &[Chunk]) -> Vec<RankedSection> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for hit in hits {
        let Some(chunk) = chunks.get(hit.index) else {
            warn!(index = hit.index, chunks = chunks.len(), "hit outside chunk metadata, ignoring");
            continue;
        };
        match groups
            .iter_mut()
            .find(|g| g.filename == chunk.filename && g.section_index == chunk.section_index)
        {
            Some(group) => group.members.push((chunk, hit.score)),
            None => groups.push(Group {
                filename: &chunk.filename,
                section_index: chunk.section_index,
                section_title: chunk.section_title.as_deref(),
                members: vec![(chunk, hit.score)],
            }),
        }
    }

    let mut ranked: Vec<RankedSection> = groups
        .into_iter()
        .map(|mut g| {
            g.members.sort_by_key(|(c, _)| c.chunk_id);
            let score = g.members.iter().map(|(_, s)| s).sum::<f32>() / g.members.len() as f32;
            RankedSection {
                filename: g.filename.to_string(),
                section_index: g.section_index,
                section_title: g.section_title.map(str::to_string),
                score,
                chunk_ids: g.members.iter().map(|(c, _)| c.chunk_id).collect(),
                text: g.members.iter().map(|(c, _)| c.text.as_str()).collect::<Vec<_>>().join("\n\n"),
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_run = false;
    for c in line.chars() {
        if c == ' ' || c == '\t' {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// Tidy section text for display. Lines of table blocks pass through untouched.
pub fn clean_text(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_table = false;
    let mut blank_run = 0usize;
    let mut previous: Option<String> = None;

    for line in text.lines() {
        if line.trim() == TABLE_START {
            in_table = true;
        }
        if in_table {
            if line.trim() == TABLE_END {
                in_table = false;
            }
            out.push(line.to_string());
            blank_run = 0;
            previous = None;
            continue;
        }

        let cleaned = collapse_spaces(line).trim().to_string();
        if cleaned.is_empty() {
            blank_run += 1;
            previous = None;
            if blank_run == 1 {
                out.push(String::new());
            }
            continue;
        }
        blank_run = 0;
        if previous.as_deref() == Some(cleaned.as_str()) {
            continue;
        }
        previous = Some(cleaned.clone());
        out.push(cleaned);
    }
    out.join("\n").trim_matches('\n').to_string()
}

/// Cut `text` to at most `max_chars` characters at a word boundary and append
/// `marker`. Text within budget is returned as is.
pub fn truncate_chars(text: &str, max_chars: usize, marker: &str) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    let head = match head.rfind(char::is_whitespace) {
        Some(ws) if ws > 0 => &head[..ws],
        _ => head,
    };
    format!("{}{}", head.trim_end(), marker)
}

pub struct RetrievalMerger {
    config: RetrievalConfig,
}

impl RetrievalMerger {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn merge(&self, question: &str, hits: &[SearchHit], chunks: &[Chunk]) -> RetrievalOutcome {
        let ranked = rank_sections(hits, chunks);
        let Some(best) = ranked.first() else {
            return RetrievalOutcome::NoMatch {
                question: question.to_string(),
                message: self.config.no_answer_text.clone(),
            };
        };
        let marker = self.config.truncation_marker.as_str();
        let answer_text = truncate_chars(&clean_text(&best.text), self.config.max_answer_chars, marker);
        let candidates = ranked
            .iter()
            .take(self.config.max_candidates)
            .map(|s| RankedSection {
                text: truncate_chars(&clean_text(&s.text), self.config.candidate_preview_chars, marker),
                ..s.clone()
            })
            .collect();
        RetrievalOutcome::Answer(Answer {
            answer_text,
            source_document: best.filename.clone(),
            section_index: best.section_index,
            section_title: best.section_title.clone(),
            score: best.score,
            candidates,
        })
    }
}
