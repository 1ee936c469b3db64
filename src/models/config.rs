use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::point::DistanceMetric;
use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8080";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-ai/nomic-embed-code";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 3584;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "documents";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docvec").join("config.toml"))
    }

    /// Load the config file (if any), then apply `.env` and `DOCVEC_*` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file()?;
        let _ = dotenvy::dotenv();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn load_file() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path()
            .ok_or_else(|| ConfigError::PathError("could not determine config directory".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DOCVEC_QDRANT_URL") {
            self.vector_store.url = url;
        }
        if let Some(key) = lookup("DOCVEC_QDRANT_API_KEY") {
            self.vector_store.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(collection) = lookup("DOCVEC_COLLECTION") {
            self.vector_store.collection = collection;
        }
        if let Some(backend) = lookup("DOCVEC_EMBEDDING_BACKEND") {
            self.embedding.backend = backend.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(model) = lookup("DOCVEC_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("DOCVEC_EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Some(path) = lookup("DOCVEC_MODEL_PATH") {
            self.embedding.model_path = Some(PathBuf::from(path));
        }
        if let Some(device) = lookup("DOCVEC_DEVICE") {
            self.embedding.device = device.parse().map_err(ConfigError::ValidationError)?;
        }
        if let Some(batch) = lookup("DOCVEC_BATCH_SIZE") {
            self.embedding.batch_size = parse_number("DOCVEC_BATCH_SIZE", &batch)?;
        }
        if let Some(size) = lookup("DOCVEC_VECTOR_SIZE") {
            self.embedding.dimension = parse_number("DOCVEC_VECTOR_SIZE", &size)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.embedding.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.concurrency must be greater than 0".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }
        if self.vector_store.upsert_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "vector_store.upsert_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "vector_store.collection must not be empty".to_string(),
            ));
        }
        self.chunking.validate()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{key} must be a number, got '{value}'")))
}

/// Which embedding implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local ONNX model.
    Onnx,
    /// Remote text-embeddings server.
    #[default]
    Http,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "onnx" | "local" => Ok(EmbeddingBackend::Onnx),
            "http" | "remote" => Ok(EmbeddingBackend::Http),
            _ => Err(format!("unknown embedding backend: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingBackend::Onnx => write!(f, "onnx"),
            EmbeddingBackend::Http => write!(f, "http"),
        }
    }
}

/// Inference device for the local model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(i32),
}

impl std::str::FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            _ => lower
                .strip_prefix("cuda:")
                .and_then(|id| id.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| format!("unknown device: {}", s)),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How token embeddings are reduced to one vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    #[default]
    Mean,
    LastToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Directory holding `model.onnx` and `tokenizer.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    /// Model input limit; longer inputs are truncated by the tokenizer.
    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Sub-batches embedded in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub device: Device,

    #[serde(default)]
    pub pooling: Pooling,

    /// Prepended to queries before embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_prefix: Option<String>,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_model_max_tokens() -> u32 {
    8192
}

fn default_batch_size() -> u32 {
    8
}

fn default_concurrency() -> u32 {
    2
}

fn default_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_embedding_model(),
            model_path: None,
            url: default_embedding_url(),
            dimension: default_dimension(),
            max_tokens: default_model_max_tokens(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout(),
            device: Device::default(),
            pooling: Pooling::default(),
            query_prefix: None,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    /// In-process store; contents are lost when the process exits.
    Memory,
}

impl std::str::FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(VectorDriver::Qdrant),
            "memory" => Ok(VectorDriver::Memory),
            _ => Err(format!("unknown vector store driver: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub distance: DistanceMetric,

    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: u32,

    /// Enable int8 scalar quantization when creating collections.
    #[serde(default)]
    pub quantization: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_upsert_batch_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            distance: DistanceMetric::default(),
            upsert_batch_size: default_upsert_batch_size(),
            quantization: false,
            max_retries: default_max_retries(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Chunk boundary strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Structured for Markdown or text with paragraph breaks, window otherwise.
    #[default]
    Auto,
    Structured,
    Window,
}

impl std::str::FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ChunkStrategy::Auto),
            "structured" => Ok(ChunkStrategy::Structured),
            "window" => Ok(ChunkStrategy::Window),
            _ => Err(format!("unknown chunk strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Characters shared between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: u32,

    /// Non-final chunks shorter than this (in characters) are merged.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: u32,

    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,

    #[serde(default)]
    pub strategy: ChunkStrategy,

    /// Optional `tokenizer.json` for exact token counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

fn default_max_tokens() -> u32 {
    512
}

fn default_overlap() -> u32 {
    100
}

fn default_min_chunk_size() -> u32 {
    200
}

fn default_chars_per_token() -> u32 {
    4
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap: default_overlap(),
            min_chunk_size: default_min_chunk_size(),
            chars_per_token: default_chars_per_token(),
            strategy: ChunkStrategy::default(),
            tokenizer_path: None,
        }
    }
}

impl ChunkingConfig {
    /// Sliding window width in characters.
    pub fn window_chars(&self) -> usize {
        (self.max_tokens as usize) * (self.chars_per_token as usize)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 || self.chars_per_token == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.max_tokens and chunking.chars_per_token must be greater than 0"
                    .to_string(),
            ));
        }
        if self.overlap as usize >= self.window_chars() {
            return Err(ConfigError::ValidationError(format!(
                "chunking.overlap ({}) must be smaller than the window ({} chars)",
                self.overlap,
                self.window_chars()
            )));
        }
        if self.min_chunk_size as usize > self.window_chars() {
            return Err(ConfigError::ValidationError(format!(
                "chunking.min_chunk_size ({}) must not exceed the window ({} chars)",
                self.min_chunk_size,
                self.window_chars()
            )));
        }
        Ok(())
    }
}

/// How documents that already have points are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Overwrite points with the same ids.
    #[default]
    Upsert,
    /// Leave documents whose source already has points.
    Skip,
    /// Delete the source's points before writing.
    Replace,
}

impl std::str::FromStr for IngestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upsert" => Ok(IngestMode::Upsert),
            "skip" => Ok(IngestMode::Skip),
            "replace" => Ok(IngestMode::Replace),
            _ => Err(format!("unknown ingest mode: {}", s)),
        }
    }
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestMode::Upsert => write!(f, "upsert"),
            IngestMode::Skip => write!(f, "skip"),
            IngestMode::Replace => write!(f, "replace"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: IngestMode,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// SQLite ledger of ingested documents; disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_path: Option<PathBuf>,
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/.venv/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/.ipynb_checkpoints/**".to_string(),
        "**/package-lock.json".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: IngestMode::default(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
            checkpoint_path: None,
        }
    }
}

impl PipelineConfig {
    /// Configured ledger path, or the default under the data directory.
    pub fn checkpoint_path_or_default(&self) -> Option<PathBuf> {
        self.checkpoint_path
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("docvec").join("checkpoint.db")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default)]
    pub default_format: OutputFormat,

    #[serde(default)]
    pub default_min_score: Option<f32>,
}

fn default_limit() -> u32 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_format: OutputFormat::Text,
            default_min_score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.chunking.window_chars(), 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [vector_store]
            collection = "manuals"
            distance = "dot"

            [embedding]
            device = "cuda:1"
            "#,
        )
        .unwrap();

        assert_eq!(config.vector_store.collection, "manuals");
        assert_eq!(config.vector_store.distance, DistanceMetric::Dot);
        assert_eq!(config.embedding.device, Device::Cuda(1));
        assert_eq!(config.chunking.max_tokens, 512);
        assert_eq!(config.vector_store.upsert_batch_size, 100);
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("DOCVEC_QDRANT_URL", "http://qdrant:6334"),
            ("DOCVEC_COLLECTION", "papers"),
            ("DOCVEC_EMBEDDING_BACKEND", "onnx"),
            ("DOCVEC_BATCH_SIZE", "32"),
            ("DOCVEC_DEVICE", "cpu"),
            ("DOCVEC_VECTOR_SIZE", "768"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.vector_store.url, "http://qdrant:6334");
        assert_eq!(config.vector_store.collection, "papers");
        assert_eq!(config.embedding.backend, EmbeddingBackend::Onnx);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.embedding.dimension, 768);
    }

    #[test]
    fn test_env_override_rejects_bad_number() {
        let vars = env(&[("DOCVEC_BATCH_SIZE", "many")]);
        let mut config = Config::default();
        let err = config.apply_overrides(|key| vars.get(key).cloned());
        assert!(matches!(err, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_rejects_overlap_wider_than_window() {
        let mut config = Config::default();
        config.chunking.max_tokens = 10;
        config.chunking.min_chunk_size = 0;
        config.chunking.overlap = 40;
        assert!(config.validate().is_err());

        config.chunking.overlap = 39;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_min_chunk_wider_than_window() {
        let mut config = Config::default();
        config.chunking.max_tokens = 10;
        config.chunking.overlap = 0;
        config.chunking.min_chunk_size = 41;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.chunking.min_chunk_size = 40;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_parse() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("tpu".parse::<Device>().is_err());
    }
}
