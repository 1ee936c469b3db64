use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::Document;
use crate::error::InterchangeError;

/// Boundary mode that produced a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    Structured,
    Window,
}

impl std::fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkMode::Structured => write!(f, "structured"),
            ChunkMode::Window => write!(f, "window"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub title: String,
    /// Heading path in effect at the chunk's first character.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
    pub subfolder: String,
    pub collection: String,
    pub total_chunks: u32,
    pub strategy: ChunkMode,
    pub created_at: String,
}

/// A contiguous slice of a document's content.
///
/// `start_offset..end_offset` are character offsets into the parent content;
/// the first `overlap` characters repeat the tail of the previous chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u32,
    pub content: String,
    pub char_count: u32,
    pub token_count: u32,
    pub start_offset: usize,
    pub end_offset: usize,
    pub overlap: u32,
    #[serde(default)]
    pub oversized: bool,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn chunk_id(&self, collection: &str) -> String {
        build_chunk_id(collection, &self.metadata.source, self.index)
    }

    /// Content with the leading overlap removed.
    pub fn fresh_content(&self) -> &str {
        match self.content.char_indices().nth(self.overlap as usize) {
            Some((byte, _)) => &self.content[byte..],
            None if self.overlap == 0 => &self.content,
            None => "",
        }
    }
}

/// Deterministic chunk identifier: `collection:source:chunk:index`.
pub fn build_chunk_id(collection: &str, source: &str, index: u32) -> String {
    let relative = source.replace(['/', '\\'], "_");
    format!("{}:{}:chunk:{}", collection, relative, index)
}

/// One entry in a chunk file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index: u32,
    pub text: String,
    pub char_count: u32,
    pub token_count: u32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Chunks of one document as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFile {
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub subfolder: String,
    pub num_chunks: u32,
    pub total_chars: u64,
    pub chunks: Vec<ChunkRecord>,
}

#[derive(Debug, Deserialize)]
struct LegacyChunk {
    #[serde(default)]
    chunk_id: Option<String>,
    content: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl ChunkFile {
    pub fn from_chunks(document: &Document, chunks: &[Chunk]) -> Self {
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .map(|chunk| {
                let metadata = match serde_json::to_value(&chunk.metadata) {
                    Ok(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                ChunkRecord {
                    index: chunk.index,
                    text: chunk.content.clone(),
                    char_count: chunk.char_count,
                    token_count: chunk.token_count,
                    metadata,
                }
            })
            .collect();

        Self {
            source: document.source_id.clone(),
            title: document.title.clone(),
            subfolder: document.subfolder.clone(),
            num_chunks: records.len() as u32,
            total_chars: records.iter().map(|r| r.char_count as u64).sum(),
            chunks: records,
        }
    }

    /// Parse either the canonical object form or the legacy array of
    /// `{chunk_id, content, metadata}` entries.
    pub fn from_json(value: Value, fallback_source: &str) -> Result<Self, InterchangeError> {
        match value {
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            Value::Array(_) => {
                let legacy: Vec<LegacyChunk> = serde_json::from_value(value)?;
                Ok(Self::from_legacy(legacy, fallback_source))
            }
            _ => Err(InterchangeError::ValidationError(
                "chunk file must be a JSON object or array".to_string(),
            )),
        }
    }

    fn from_legacy(legacy: Vec<LegacyChunk>, fallback_source: &str) -> Self {
        let source = legacy
            .iter()
            .find_map(|c| c.metadata.get("source").and_then(Value::as_str))
            .unwrap_or(fallback_source)
            .to_string();
        let subfolder = legacy
            .iter()
            .find_map(|c| c.metadata.get("subfolder").and_then(Value::as_str))
            .filter(|s| *s != ".")
            .unwrap_or_default()
            .to_string();
        let title = stem_of(&source);

        let chunks: Vec<ChunkRecord> = legacy
            .into_iter()
            .enumerate()
            .map(|(position, chunk)| {
                let index = chunk
                    .metadata
                    .get("chunk_index")
                    .and_then(Value::as_u64)
                    .map(|i| i as u32)
                    .unwrap_or(position as u32);
                let char_count = chunk.content.chars().count() as u32;
                let mut metadata = chunk.metadata;
                if let Some(id) = chunk.chunk_id {
                    metadata.insert("legacy_chunk_id".to_string(), Value::String(id));
                }
                ChunkRecord {
                    index,
                    char_count,
                    token_count: char_count.div_ceil(4),
                    text: chunk.content,
                    metadata,
                }
            })
            .collect();

        Self {
            source,
            title,
            subfolder,
            num_chunks: chunks.len() as u32,
            total_chars: chunks.iter().map(|r| r.char_count as u64).sum(),
            chunks,
        }
    }
}

fn stem_of(source: &str) -> String {
    let name = source.rsplit(['/', '\\']).next().unwrap_or(source);
    name.rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_chunk(content: &str, overlap: u32) -> Chunk {
        Chunk {
            index: 1,
            content: content.to_string(),
            char_count: content.chars().count() as u32,
            token_count: 1,
            start_offset: 0,
            end_offset: content.chars().count(),
            overlap,
            oversized: false,
            metadata: ChunkMetadata {
                source: "guides/intro.md".to_string(),
                title: "Intro".to_string(),
                headings: vec![],
                subfolder: "guides".to_string(),
                collection: "docs".to_string(),
                total_chunks: 2,
                strategy: ChunkMode::Window,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        }
    }

    #[test]
    fn test_chunk_id_replaces_separators() {
        let chunk = sample_chunk("abc", 0);
        assert_eq!(chunk.chunk_id("docs"), "docs:guides_intro.md:chunk:1");
    }

    #[test]
    fn test_fresh_content_strips_overlap() {
        assert_eq!(sample_chunk("héllo world", 3).fresh_content(), "lo world");
        assert_eq!(sample_chunk("abc", 0).fresh_content(), "abc");
    }

    #[test]
    fn test_canonical_chunk_file_parses() {
        let value = json!({
            "source": "a.md",
            "title": "A",
            "num_chunks": 1,
            "total_chars": 5,
            "chunks": [{"index": 0, "text": "hello", "char_count": 5, "token_count": 2}]
        });
        let file = ChunkFile::from_json(value, "ignored.json").unwrap();
        assert_eq!(file.source, "a.md");
        assert_eq!(file.chunks[0].text, "hello");
        assert!(file.chunks[0].metadata.is_empty());
    }

    #[test]
    fn test_legacy_chunk_file_converts() {
        let value = json!([
            {
                "chunk_id": "fastmcp:servers:intro:chunk:0",
                "content": "first chunk",
                "metadata": {"source": "servers/intro.md", "subfolder": "servers", "chunk_index": 0}
            },
            {
                "chunk_id": "fastmcp:servers:intro:chunk:1",
                "content": "second",
                "metadata": {"source": "servers/intro.md", "subfolder": "servers", "chunk_index": 1}
            }
        ]);
        let file = ChunkFile::from_json(value, "intro_chunks.json").unwrap();

        assert_eq!(file.source, "servers/intro.md");
        assert_eq!(file.title, "intro");
        assert_eq!(file.subfolder, "servers");
        assert_eq!(file.num_chunks, 2);
        assert_eq!(file.total_chars, 17);
        assert_eq!(file.chunks[1].index, 1);
        assert_eq!(file.chunks[1].token_count, 2);
        assert_eq!(
            file.chunks[0].metadata["legacy_chunk_id"],
            "fastmcp:servers:intro:chunk:0"
        );
    }

    #[test]
    fn test_chunk_file_rejects_scalar() {
        assert!(ChunkFile::from_json(json!(42), "x.json").is_err());
    }
}
