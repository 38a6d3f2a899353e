//! docrag-retrieve
//!
//! Query-time side: search the active snapshot, regroup chunk hits into the
//! sections they came from, rank, clean and trim the winner.

pub mod debug;
pub mod merge;
pub mod retriever;

pub use merge::{clean_text, rank_sections, truncate_chars, Answer, RankedSection, RetrievalMerger, RetrievalOutcome};
pub use retriever::Retriever;
