use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chunk::{ChunkFile, ChunkRecord, build_chunk_id};
use super::point::StoredPoint;

/// Whether text is embedded as a stored passage or as a search query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    Document,
    Query,
}

/// Per-text result of a batch embedding call.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    Embedded(Vec<f32>),
    /// Input was empty or whitespace and was not sent to the model.
    Empty,
    Failed { reason: String },
}

impl EmbedOutcome {
    pub fn vector(&self) -> Option<&[f32]> {
        match self {
            EmbedOutcome::Embedded(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, EmbedOutcome::Embedded(_))
    }
}

/// One line of an embeddings JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub collection: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub embedding: Vec<f32>,
}

impl EmbeddingRecord {
    /// Build the record for one chunk, merging file-level fields over the
    /// chunk's own metadata.
    pub fn from_chunk(
        file: &ChunkFile,
        chunk: &ChunkRecord,
        collection: &str,
        embedding: Vec<f32>,
        model: &str,
    ) -> Self {
        let id = build_chunk_id(collection, &file.source, chunk.index);

        let mut metadata = chunk.metadata.clone();
        let fields = [
            ("text", Value::from(chunk.text.as_str())),
            ("source", Value::from(file.source.as_str())),
            ("subfolder", Value::from(file.subfolder.as_str())),
            ("title", Value::from(file.title.as_str())),
            ("collection", Value::from(collection)),
            ("chunk_index", Value::from(chunk.index)),
            ("total_chunks", Value::from(file.num_chunks)),
            ("char_count", Value::from(chunk.char_count)),
            ("token_count", Value::from(chunk.token_count)),
            ("embedding_model", Value::from(model)),
        ];
        for (key, value) in fields {
            metadata.insert(key.to_string(), value);
        }

        Self {
            id,
            collection: collection.to_string(),
            metadata,
            embedding,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    /// Convert to a storable point, stamping `indexed_at`.
    pub fn into_point(self, indexed_at: &str) -> StoredPoint {
        let mut payload = self.metadata;
        if !payload.contains_key("text")
            && let Some(content) = payload.get("content").cloned()
        {
            payload.insert("text".to_string(), content);
        }
        payload
            .entry("source".to_string())
            .or_insert_with(|| Value::from("unknown"));
        payload
            .entry("collection".to_string())
            .or_insert_with(|| Value::from(self.collection.as_str()));
        payload.insert("indexed_at".to_string(), Value::from(indexed_at));

        StoredPoint::new(&self.id, self.embedding, payload)
    }
}
