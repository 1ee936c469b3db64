mod chunk;
mod config;
mod document;
mod embedding;
mod point;
mod search;

pub use chunk::{Chunk, ChunkFile, ChunkMetadata, ChunkMode, ChunkRecord, build_chunk_id};
pub use config::{
    ChunkStrategy, ChunkingConfig, Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_QDRANT_URL, Device, EmbeddingBackend,
    EmbeddingConfig, IngestMode, PipelineConfig, Pooling, SearchConfig, VectorDriver,
    VectorStoreConfig,
};
pub use document::{Document, DocumentFormat};
pub use embedding::{EmbedKind, EmbedOutcome, EmbeddingRecord};
pub use point::{CollectionInfo, DistanceMetric, ScoredPoint, StoredPoint, point_id};
pub use search::{OutputFormat, SearchQuery, SearchResult, SearchResults};
