//! Filesystem document source.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::loader::DocumentFormat;
use crate::traits::DocumentSource;
use crate::types::SourceDocument;

/// Every supported document under `root`, keyed by its `/`-separated relative path.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_candidate(p))
            .collect();
        files.sort();
        files
    }
}

fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { return false };
    // Office lock files look like `~$report.docx`.
    if name.starts_with('.') || name.starts_with("~$") {
        return false;
    }
    DocumentFormat::from_filename(name).is_some()
}

impl DocumentSource for DirectorySource {
    fn documents(&self) -> anyhow::Result<Vec<SourceDocument>> {
        if !self.root.is_dir() {
            anyhow::bail!("documents directory {} does not exist", self.root.display());
        }
        let mut docs = Vec::new();
        for path in self.list_files() {
            let rel = path.strip_prefix(&self.root).unwrap_or(&path);
            let filename = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
            match std::fs::read(&path) {
                Ok(bytes) => {
                    debug!(filename = %filename, bytes = bytes.len(), "found document");
                    docs.push(SourceDocument { filename, bytes });
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        Ok(docs)
    }
}
