//! Vector store abstraction layer.
//!
//! Backends implement the primitive operations; collection guards and the
//! validated, batched, retried `upsert` are shared by every backend.

mod memory;
mod qdrant;

pub use memory::MemoryBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::VectorStoreError;
use crate::models::{
    CollectionInfo, DistanceMetric, ScoredPoint, StoredPoint, VectorDriver, VectorStoreConfig,
};
use crate::utils::{RetryConfig, with_retry};

/// Write settings shared by all backends.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Points per upsert request.
    pub batch_size: usize,
    pub retry: RetryConfig,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::from_config(&VectorStoreConfig::default())
    }
}

impl WriteOptions {
    pub fn from_config(config: &VectorStoreConfig) -> Self {
        Self {
            batch_size: (config.upsert_batch_size as usize).max(1),
            retry: RetryConfig::new(config.max_retries).with_initial_delay(Duration::from_millis(500)),
        }
    }
}

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs and status output.
    fn backend_name(&self) -> &'static str;

    fn write_options(&self) -> &WriteOptions;

    /// Check if the vector store is reachable.
    async fn health_check(&self) -> Result<(), VectorStoreError>;

    /// Returns None if the collection doesn't exist.
    async fn collection_info(&self, name: &str)
    -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create a collection that is known not to exist.
    async fn create_collection(
        &self,
        name: &str,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError>;

    /// Delete a collection. Returns whether it existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, VectorStoreError>;

    /// Write one batch of points, overwriting points with the same ids.
    async fn upsert_batch(&self, name: &str, points: &[StoredPoint])
    -> Result<(), VectorStoreError>;

    /// Nearest neighbours of `vector`, best first, all scoring `>= score_threshold`.
    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError>;

    /// Delete every point whose payload `source` equals `source`.
    async fn delete_by_source(&self, name: &str, source: &str) -> Result<(), VectorStoreError>;

    async fn source_exists(&self, name: &str, source: &str) -> Result<bool, VectorStoreError>;

    async fn count(&self, name: &str) -> Result<u64, VectorStoreError>;

    /// Create the collection if absent; an existing collection must match
    /// `vector_size` and `distance`.
    async fn ensure_collection(
        &self,
        name: &str,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<CollectionInfo, VectorStoreError> {
        match self.collection_info(name).await? {
            Some(info) => {
                if info.vector_size != vector_size {
                    return Err(VectorStoreError::DimensionMismatch {
                        collection: name.to_string(),
                        expected: info.vector_size,
                        actual: vector_size,
                    });
                }
                if info.distance != distance {
                    return Err(VectorStoreError::DistanceMismatch {
                        collection: name.to_string(),
                        existing: info.distance.to_string(),
                        requested: distance.to_string(),
                    });
                }
                Ok(info)
            }
            None => {
                self.create_collection(name, vector_size, distance).await?;
                info!(
                    backend = self.backend_name(),
                    collection = name,
                    vector_size,
                    distance = %distance,
                    "created collection"
                );
                Ok(CollectionInfo {
                    name: name.to_string(),
                    vector_size,
                    distance,
                    points_count: 0,
                })
            }
        }
    }

    /// Drop the collection if present and create it empty.
    async fn recreate_collection(
        &self,
        name: &str,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError> {
        if self.delete_collection(name).await? {
            info!(backend = self.backend_name(), collection = name, "deleted collection");
        }
        self.create_collection(name, vector_size, distance).await
    }

    /// Validate every vector against the collection, then write in batches,
    /// retrying each batch with backoff. Returns the number of points written.
    async fn upsert(&self, name: &str, points: Vec<StoredPoint>) -> Result<usize, VectorStoreError> {
        if points.is_empty() {
            return Ok(0);
        }

        let info = self
            .collection_info(name)
            .await?
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))?;
        if let Some(bad) = points
            .iter()
            .find(|p| p.vector.len() as u64 != info.vector_size)
        {
            return Err(VectorStoreError::DimensionMismatch {
                collection: name.to_string(),
                expected: info.vector_size,
                actual: bad.vector.len() as u64,
            });
        }

        let options = self.write_options();
        let total_batches = points.len().div_ceil(options.batch_size);
        for (n, batch) in points.chunks(options.batch_size).enumerate() {
            with_retry(&options.retry, "upsert", || self.upsert_batch(name, batch))
                .await
                .into_result()?;
            debug!(
                collection = name,
                batch = n + 1,
                total = total_batches,
                points = batch.len(),
                "upserted batch"
            );
        }
        Ok(points.len())
    }
}

/// Create a vector store backend based on configuration.
pub fn create_backend(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => Ok(Arc::new(QdrantBackend::new(config)?)),
        VectorDriver::Memory => Ok(Arc::new(MemoryBackend::new(WriteOptions::from_config(
            config,
        )))),
    }
}
