pub mod checkpoint;
pub mod chunker;
pub mod embedding;
pub mod interchange;
pub mod pipeline;
pub mod tokens;
pub mod vector_store;

pub use checkpoint::{Checkpoint, CheckpointStats};
pub use chunker::TextChunker;
pub use embedding::{BatchEmbedder, Embedder, create_embedder};
pub use pipeline::{
    ChunkFailure, DocumentInput, DocumentReport, DocumentState, Pipeline, PipelineContext,
    RunOptions, RunSummary, Stage, UploadSummary, search, upload_records,
};
pub use tokens::{HeuristicCounter, TokenCounter, TokenizerCounter};
pub use vector_store::{MemoryBackend, QdrantBackend, VectorStore, WriteOptions, create_backend};
