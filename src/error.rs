//! Error types for docvec.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors related to chunking setup.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("failed to load tokenizer: {0}")]
    TokenizerError(String),

    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),

    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,

    #[error("empty input")]
    EmptyInput,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Errors after which no embedding can be produced for the rest of a run.
    /// Connection failures count once retries are exhausted.
    pub fn is_fatal(&self) -> bool {
        match self {
            EmbeddingError::ModelLoad(_)
            | EmbeddingError::ConnectionError(_)
            | EmbeddingError::Timeout => true,
            EmbeddingError::RequestError(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error(
        "collection '{collection}' has vector size {expected}, got vectors of size {actual}"
    )]
    DimensionMismatch {
        collection: String,
        expected: u64,
        actual: u64,
    },

    #[error("collection '{collection}' uses {existing} distance, requested {requested}")]
    DistanceMismatch {
        collection: String,
        existing: String,
        requested: String,
    },

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),

    #[error("Qdrant client error: {0}")]
    ClientError(String),
}

impl VectorStoreError {
    /// Configuration errors abort a run; retrying cannot fix them.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            VectorStoreError::DimensionMismatch { .. }
                | VectorStoreError::DistanceMismatch { .. }
                | VectorStoreError::CollectionNotFound(_)
        )
    }
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::DimensionMismatch { .. }
            | VectorStoreError::DistanceMismatch { .. }
            | VectorStoreError::CollectionNotFound(_) => false,
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::UpsertError(msg)
            | VectorStoreError::SearchError(msg)
            | VectorStoreError::DeleteError(msg)
            | VectorStoreError::ClientError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors related to reading and converting source documents.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} exceeds maximum size: {size} > {max}")]
    TooLarge { path: String, size: u64, max: u64 },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to convert {path}: {reason}")]
    ConversionError { path: String, reason: String },

    #[error("directory walk error: {0}")]
    WalkError(String),
}

/// Errors related to chunk files and embeddings JSONL files.
#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("invalid JSON at line {line}: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors related to the ingestion checkpoint ledger.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("checkpoint lock poisoned")]
    LockPoisoned,
}

/// Run-level failures that stop the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("interchange error: {0}")]
    Interchange(#[from] InterchangeError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_is_config_error() {
        let err = VectorStoreError::DimensionMismatch {
            collection: "docs".to_string(),
            expected: 768,
            actual: 384,
        };
        assert!(err.is_config_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connection_errors_are_retryable() {
        assert!(VectorStoreError::ConnectionError("refused".to_string()).is_retryable());
        assert!(VectorStoreError::UpsertError("connection reset".to_string()).is_retryable());
        assert!(!VectorStoreError::UpsertError("bad request".to_string()).is_retryable());
    }

    #[test]
    fn test_model_load_is_fatal() {
        assert!(EmbeddingError::ModelLoad("missing".to_string()).is_fatal());
        assert!(EmbeddingError::ConnectionError("refused".to_string()).is_fatal());
        assert!(EmbeddingError::Timeout.is_fatal());
        assert!(!EmbeddingError::InferenceError("nan".to_string()).is_fatal());
        assert!(!EmbeddingError::ServerError("503".to_string()).is_fatal());
    }
}
