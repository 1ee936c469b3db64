//! Chunk files and embeddings JSONL on disk.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::InterchangeError;
use crate::models::{ChunkFile, EmbeddingRecord};
use crate::utils::preview;

const CHUNK_SUFFIX: &str = "_chunks.json";

/// File name for the chunks of `source`: path separators become `_` and the
/// extension is kept.
pub fn chunk_file_name(source: &str) -> String {
    format!("{}{}", source.replace(['/', '\\'], "_"), CHUNK_SUFFIX)
}

/// Write `file` as pretty JSON into `dir`, plus a plain-text preview next to it.
pub fn write_chunk_file(dir: &Path, file: &ChunkFile) -> Result<PathBuf, InterchangeError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(chunk_file_name(&file.source));

    let json = serde_json::to_string_pretty(file)?;
    fs::write(&path, json)?;
    fs::write(path.with_extension("txt"), render_chunk_preview(file))?;

    Ok(path)
}

/// Writes chunk files for one run and refuses to let two sources share a file.
pub struct ChunkFileWriter {
    dir: PathBuf,
    written: HashMap<String, String>,
}

impl ChunkFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: HashMap::new(),
        }
    }

    pub fn write(&mut self, file: &ChunkFile) -> Result<PathBuf, InterchangeError> {
        let name = chunk_file_name(&file.source);
        if let Some(previous) = self.written.get(&name)
            && previous != &file.source
        {
            return Err(InterchangeError::ValidationError(format!(
                "sources '{}' and '{}' both map to chunk file {}",
                previous, file.source, name
            )));
        }
        let path = write_chunk_file(&self.dir, file)?;
        self.written.insert(name, file.source.clone());
        Ok(path)
    }
}

/// Human-readable dump of a chunk file.
pub fn render_chunk_preview(file: &ChunkFile) -> String {
    let mut out = format!(
        "Source: {}\nTitle: {}\nChunks: {}\nTotal chars: {}\n",
        file.source, file.title, file.num_chunks, file.total_chars
    );
    for chunk in &file.chunks {
        out.push_str(&format!(
            "\n--- Chunk {} ({} chars, ~{} tokens) ---\n{}\n",
            chunk.index, chunk.char_count, chunk.token_count, chunk.text
        ));
    }
    out
}

pub fn read_chunk_file(path: &Path) -> Result<ChunkFile, InterchangeError> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let fallback = name.strip_suffix(CHUNK_SUFFIX).unwrap_or(&name);
    let file = ChunkFile::from_json(value, fallback)?;

    if file.chunks.len() != file.num_chunks as usize {
        warn!(
            path = %path.display(),
            declared = file.num_chunks,
            actual = file.chunks.len(),
            "chunk count does not match num_chunks"
        );
    }
    Ok(file)
}

/// Chunk files under `dir`, sorted. A file path is returned as is.
pub fn collect_chunk_files(dir: &Path) -> Result<Vec<PathBuf>, InterchangeError> {
    if dir.is_file() {
        return Ok(vec![dir.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| InterchangeError::IoError(e.into()))?;
        if entry.file_type().is_file()
            && entry.file_name().to_string_lossy().ends_with(CHUNK_SUFFIX)
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Streaming writer for embeddings JSONL.
pub struct EmbeddingsWriter {
    writer: BufWriter<File>,
    written: usize,
}

impl EmbeddingsWriter {
    pub fn create(path: &Path) -> Result<Self, InterchangeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            written: 0,
        })
    }

    pub fn write(&mut self, record: &EmbeddingRecord) -> Result<(), InterchangeError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<usize, InterchangeError> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

/// Read every record of an embeddings JSONL file. Blank lines are skipped;
/// a malformed line fails with its 1-based line number.
pub fn read_embeddings(path: &Path) -> Result<Vec<EmbeddingRecord>, InterchangeError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: EmbeddingRecord = serde_json::from_str(&line)
            .map_err(|source| InterchangeError::InvalidLine { line: n + 1, source })?;
        if record.embedding.is_empty() {
            return Err(InterchangeError::ValidationError(format!(
                "line {}: record '{}' has an empty embedding ({})",
                n + 1,
                record.id,
                preview(&line, 60)
            )));
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkRecord;
    use serde_json::{Map, json};

    fn sample_file() -> ChunkFile {
        ChunkFile {
            source: "guides/setup.md".to_string(),
            title: "Setup".to_string(),
            subfolder: "guides".to_string(),
            num_chunks: 1,
            total_chars: 11,
            chunks: vec![ChunkRecord {
                index: 0,
                text: "hello world".to_string(),
                char_count: 11,
                token_count: 3,
                metadata: Map::new(),
            }],
        }
    }

    fn file_for(source: &str) -> ChunkFile {
        ChunkFile {
            source: source.to_string(),
            ..sample_file()
        }
    }

    #[test]
    fn test_chunk_file_name() {
        assert_eq!(chunk_file_name("guides/setup.md"), "guides_setup.md_chunks.json");
        assert_eq!(chunk_file_name("README"), "README_chunks.json");
        assert_ne!(chunk_file_name("guide.md"), chunk_file_name("guide.pdf"));
    }

    #[test]
    fn test_same_stem_different_extension_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ChunkFileWriter::new(dir.path());
        let md = writer.write(&file_for("guide.md")).unwrap();
        let pdf = writer.write(&file_for("guide.pdf")).unwrap();

        assert_ne!(md, pdf);
        assert_eq!(read_chunk_file(&md).unwrap().source, "guide.md");
        assert_eq!(read_chunk_file(&pdf).unwrap().source, "guide.pdf");
        assert_eq!(collect_chunk_files(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_flattened_name_clash_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ChunkFileWriter::new(dir.path());
        let first = writer.write(&file_for("a/b.md")).unwrap();

        let err = writer.write(&file_for("a_b.md")).unwrap_err();
        assert!(matches!(err, InterchangeError::ValidationError(_)));
        assert_eq!(read_chunk_file(&first).unwrap().source, "a/b.md");

        // rewriting the same source is fine
        writer.write(&file_for("a/b.md")).unwrap();
    }

    #[test]
    fn test_write_then_read_chunk_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_chunk_file(dir.path(), &sample_file()).unwrap();

        assert!(path.with_extension("txt").exists());
        let read = read_chunk_file(&path).unwrap();
        assert_eq!(read.source, "guides/setup.md");
        assert_eq!(read.chunks[0].text, "hello world");

        let found = collect_chunk_files(dir.path()).unwrap();
        assert_eq!(found, vec![path]);
    }

    #[test]
    fn test_read_legacy_chunk_file_uses_name_as_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md_chunks.json");
        fs::write(&path, json!([{"content": "legacy text"}]).to_string()).unwrap();

        let file = read_chunk_file(&path).unwrap();
        assert_eq!(file.source, "notes.md");
        assert_eq!(file.chunks[0].text, "legacy text");
    }

    #[test]
    fn test_embeddings_jsonl_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("embeddings.jsonl");
        let file = sample_file();

        let mut writer = EmbeddingsWriter::create(&path).unwrap();
        writer
            .write(&EmbeddingRecord::from_chunk(&file, &file.chunks[0], "docs", vec![0.1, 0.2], "m"))
            .unwrap();
        assert_eq!(writer.finish().unwrap(), 1);

        let records = read_embeddings(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "docs:guides_setup.md:chunk:0");
        assert_eq!(records[0].embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        let good = json!({"id": "a", "collection": "c", "metadata": {}, "embedding": [1.0]});
        fs::write(&path, format!("{}\n\n{{not json\n", good)).unwrap();

        let err = read_embeddings(&path).unwrap_err();
        assert!(matches!(err, InterchangeError::InvalidLine { line: 3, .. }));
    }

    #[test]
    fn test_empty_embedding_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        let line = json!({"id": "a", "collection": "c", "embedding": []});
        fs::write(&path, format!("{}\n", line)).unwrap();

        assert!(matches!(
            read_embeddings(&path).unwrap_err(),
            InterchangeError::ValidationError(_)
        ));
    }
}
