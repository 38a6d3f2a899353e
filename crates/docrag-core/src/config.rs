//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_CHUNKING__MAX_WORDS=200`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against the config directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory using `RUST_ENV` (default `dev`).
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration with paths resolved against the
    /// directory the config was loaded from.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.paths.docs_dir = resolve_with_base(&self.base_dir, settings.paths.docs_dir.to_string_lossy());
        settings.paths.index_dir = resolve_with_base(&self.base_dir, settings.paths.index_dir.to_string_lossy());
        if let Some(dir) = settings.embedding.model_dir.take() {
            settings.embedding.model_dir = Some(resolve_with_base(&self.base_dir, dir.to_string_lossy()));
        }
        if let Some(p) = settings.retrieval.debug_dump.take() {
            settings.retrieval.debug_dump = Some(resolve_with_base(&self.base_dir, p.to_string_lossy()));
        }
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub parser: ParserConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        self.chunking.validate()?;
        self.parser.validate()?;
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be positive".into()));
        }
        if self.retrieval.query_timeout_ms == 0 {
            return Err(Error::InvalidConfig("retrieval.query_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub docs_dir: PathBuf,
    pub index_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { docs_dir: PathBuf::from("data/docs"), index_dir: PathBuf::from("data/index") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Regexes matched against a paragraph's trimmed text.
    pub heading_patterns: Vec<String>,
    /// Pattern matches on longer paragraphs are treated as body text.
    pub max_heading_words: usize,
    /// Style-name prefixes that mark a heading paragraph.
    pub heading_styles: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            heading_patterns: vec![
                r"^\d+(\.\d+)*[.)]?\s+\S".to_string(),
                r"^(Άρθρο|ΑΡΘΡΟ|Article|ARTICLE)\s+\d+".to_string(),
                r"^(Θέμα|ΘΕΜΑ|Topic|TOPIC)\b".to_string(),
                r"^(Ενότητα|ΕΝΟΤΗΤΑ|Section|SECTION)\b".to_string(),
            ],
            max_heading_words: 20,
            heading_styles: vec![
                "heading".to_string(),
                "title".to_string(),
                "επικεφαλίδα".to_string(),
            ],
        }
    }
}

impl ParserConfig {
    fn validate(&self) -> Result<(), Error> {
        for p in &self.heading_patterns {
            regex::Regex::new(p)
                .map_err(|e| Error::InvalidConfig(format!("bad heading pattern '{}': {}", p, e)))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_words: usize,
    /// Prose chunks with fewer words are dropped as noise.
    pub min_words: usize,
    /// Phrases that, ending a prose chunk, pull the following table into it.
    pub table_cues: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: 300,
            overlap_words: 50,
            min_words: 5,
            table_cues: [
                "see table below",
                "see the table below",
                "the following table",
                "as shown in the table",
                "βλέπε πίνακα",
                "βλ. πίνακα",
                "στον παρακάτω πίνακα",
                "ο παρακάτω πίνακας",
                "ακολουθεί πίνακας",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_words == 0 {
            return Err(Error::InvalidConfig("chunking.max_words must be positive".into()));
        }
        if self.overlap_words >= self.max_words {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_words ({}) must be smaller than max_words ({})",
                self.overlap_words, self.max_words
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory holding `tokenizer.json`, `config.json` and the weights.
    pub model_dir: Option<PathBuf>,
    pub use_fake: bool,
    /// Dimension of the fake embedder; the real model reports its own.
    pub dim: usize,
    pub max_len: usize,
    /// Texts per embedding call while indexing.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, dim: 768, max_len: 512, batch_size: 32 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_answer_chars: usize,
    pub max_candidates: usize,
    pub candidate_preview_chars: usize,
    pub query_timeout_ms: u64,
    pub truncation_marker: String,
    pub no_answer_text: String,
    /// When set, every query writes its raw hits here as JSON.
    pub debug_dump: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 7,
            max_answer_chars: 4000,
            max_candidates: 5,
            candidate_preview_chars: 600,
            query_timeout_ms: 10_000,
            truncation_marker: " ...".to_string(),
            no_answer_text: "No relevant answer was found.".to_string(),
            debug_dump: None,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
