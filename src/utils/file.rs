//! File utilities for document loading.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::SourceError;

/// Calculate SHA-256 checksum of content.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Read raw file bytes, refusing files larger than `max_size`.
pub fn read_file_bytes(path: &Path, max_size: u64) -> Result<Vec<u8>, SourceError> {
    let display = path.display().to_string();
    let metadata = fs::metadata(path).map_err(|source| SourceError::ReadError {
        path: display.clone(),
        source,
    })?;

    if metadata.len() > max_size {
        return Err(SourceError::TooLarge {
            path: display,
            size: metadata.len(),
            max: max_size,
        });
    }

    fs::read(path).map_err(|source| SourceError::ReadError {
        path: display,
        source,
    })
}

/// Read file content as UTF-8 with size limit.
pub fn read_file_content(path: &Path, max_size: u64) -> Result<String, SourceError> {
    let bytes = read_file_bytes(path, max_size)?;
    String::from_utf8(bytes).map_err(|e| SourceError::ConversionError {
        path: path.display().to_string(),
        reason: format!("not valid UTF-8: {e}"),
    })
}

/// Lowercased file extension, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Get the relative path from a base directory, using `/` separators.
pub fn get_relative_path(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base).ok().map(|p| {
        p.components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_calculate_checksum() {
        let checksum = calculate_checksum("hello world");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, calculate_checksum("hello world"));
    }

    #[test]
    fn test_read_file_content_size_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", "x".repeat(100)).unwrap();

        assert!(read_file_content(file.path(), 1000).is_ok());
        let err = read_file_content(file.path(), 10).unwrap_err();
        assert!(matches!(err, SourceError::TooLarge { size: 100, max: 10, .. }));
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let base = PathBuf::from("/docs");
        let path = base.join("guides").join("intro.md");
        assert_eq!(
            get_relative_path(&base, &path),
            Some("guides/intro.md".to_string())
        );
        assert_eq!(get_relative_path(&base, Path::new("/other/a.md")), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("A.MD")), Some("md".to_string()));
        assert_eq!(extension_of(Path::new("README")), None);
    }
}
