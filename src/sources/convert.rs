//! Conversion of raw files into Markdown-ish text.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use serde_json::Value;

use crate::error::SourceError;
use crate::models::DocumentFormat;
use crate::utils::file::{read_file_bytes, read_file_content};

/// Read `path` and convert it to text according to `format`.
pub fn convert_file(
    path: &Path,
    format: DocumentFormat,
    max_size: u64,
) -> Result<String, SourceError> {
    match format {
        DocumentFormat::Markdown | DocumentFormat::Text => read_file_content(path, max_size),
        DocumentFormat::Json => {
            let raw = read_file_content(path, max_size)?;
            json_to_markdown(&raw, &stem(path)).map_err(|reason| conversion_error(path, reason))
        }
        DocumentFormat::Pdf => {
            let bytes = read_file_bytes(path, max_size)?;
            pdf_to_text(&bytes).map_err(|reason| conversion_error(path, reason))
        }
    }
}

/// `# <title>` followed by the pretty-printed value in a fenced block.
pub fn json_to_markdown(raw: &str, title: &str) -> Result<String, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    let pretty = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    Ok(format!("# {}\n\n```json\n{}\n```\n", title, pretty))
}

pub fn pdf_to_text(bytes: &[u8]) -> Result<String, String> {
    // pdf-extract panics on some malformed inputs
    let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| "PDF parser panicked".to_string())?;
    let text = extracted.map_err(|e| e.to_string())?;
    Ok(normalize_pdf_text(&text))
}

/// Collapse the runs of blank lines PDF extraction tends to produce.
fn normalize_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn conversion_error(path: &Path, reason: String) -> SourceError {
    SourceError::ConversionError {
        path: path.display().to_string(),
        reason,
    }
}
