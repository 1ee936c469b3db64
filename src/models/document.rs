use serde::{Deserialize, Serialize};

use crate::utils::{calculate_checksum, extract_title};

/// Format a document was converted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Markdown,
    Pdf,
    Json,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "pdf" => Some(DocumentFormat::Pdf),
            "json" => Some(DocumentFormat::Json),
            "txt" | "text" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentFormat::Markdown => write!(f, "markdown"),
            DocumentFormat::Pdf => write!(f, "pdf"),
            DocumentFormat::Json => write!(f, "json"),
            DocumentFormat::Text => write!(f, "text"),
        }
    }
}

/// A loaded source document. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub format: DocumentFormat,
    pub subfolder: String,
    pub checksum: String,
}

impl Document {
    /// Build a document from converted text. The title falls back to the
    /// last path segment without its extension.
    pub fn new(source_id: impl Into<String>, content: String, format: DocumentFormat) -> Self {
        let source_id = source_id.into();
        let title = extract_title(&content).unwrap_or_else(|| file_stem(&source_id));
        let subfolder = source_id
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        let checksum = calculate_checksum(&content);

        Self {
            source_id,
            title,
            content,
            format,
            subfolder,
            checksum,
        }
    }

    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}

fn file_stem(source_id: &str) -> String {
    let name = source_id.rsplit('/').next().unwrap_or(source_id);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}
