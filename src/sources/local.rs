//! Local file system source.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::convert::convert_file;
use crate::error::SourceError;
use crate::models::{Document, DocumentFormat};
use crate::services::DocumentInput;
use crate::utils::file::{extension_of, get_relative_path};

/// Documents under a directory, or a single file.
#[derive(Debug)]
pub struct LocalSource {
    root: PathBuf,
    exclude_patterns: Vec<Pattern>,
    max_file_size: u64,
}

impl LocalSource {
    pub fn new(root: PathBuf, exclude_patterns: &[String], max_file_size: u64) -> Self {
        let exclude_patterns = exclude_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            root,
            exclude_patterns,
            max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let full = path.to_string_lossy();
        let relative = get_relative_path(&self.root, path).unwrap_or_default();
        self.exclude_patterns
            .iter()
            .any(|p| p.matches(&full) || p.matches(&relative))
    }

    /// Supported files under the root, sorted.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        if !self.root.exists() {
            return Err(SourceError::WalkError(format!(
                "path does not exist: {}",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| SourceError::WalkError(e.to_string()))?;
            let path = entry.path();

            if !entry.file_type().is_file() || self.is_excluded(path) {
                continue;
            }
            if extension_of(path)
                .and_then(|ext| DocumentFormat::from_extension(&ext))
                .is_some()
            {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        debug!(root = %self.root.display(), files = files.len(), "collected files");
        Ok(files)
    }

    /// Identifier of `path`: relative to the root directory, or the path
    /// itself when the root is a single file.
    pub fn source_id(&self, path: &Path) -> String {
        if self.root.is_dir()
            && let Some(relative) = get_relative_path(&self.root, path)
        {
            return relative;
        }
        path.to_string_lossy().to_string()
    }

    pub fn load(&self, path: &Path) -> Result<Document, SourceError> {
        let format = extension_of(path)
            .and_then(|ext| DocumentFormat::from_extension(&ext))
            .ok_or_else(|| SourceError::UnsupportedFormat(path.display().to_string()))?;

        let content = convert_file(path, format, self.max_file_size)?;
        Ok(Document::new(self.source_id(path), content, format))
    }

    /// Load every collected file. Files that fail to load are returned as
    /// [`DocumentInput::Unreadable`].
    pub fn load_all(&self) -> Result<Vec<DocumentInput>, SourceError> {
        Ok(self
            .collect_files()?
            .iter()
            .map(|path| match self.load(path) {
                Ok(document) => DocumentInput::Loaded(document),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load document");
                    DocumentInput::Unreadable {
                        source_id: self.source_id(path),
                        reason: e.to_string(),
                    }
                }
            })
            .collect())
    }
}
