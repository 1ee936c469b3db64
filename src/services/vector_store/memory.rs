//! In-process vector store.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{VectorStore, WriteOptions};
use crate::error::VectorStoreError;
use crate::models::{CollectionInfo, DistanceMetric, ScoredPoint, StoredPoint};

struct MemoryCollection {
    vector_size: u64,
    distance: DistanceMetric,
    points: BTreeMap<u64, StoredPoint>,
}

/// Exact-search store kept in memory. Useful for dry runs and tests.
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, MemoryCollection>>,
    options: WriteOptions,
    failures: AtomicU32,
}

impl MemoryBackend {
    pub fn new(options: WriteOptions) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            options,
            failures: AtomicU32::new(0),
        }
    }

    /// Make the next `n` batch writes fail with a connection error.
    #[cfg(test)]
    pub(crate) fn fail_next_upserts(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(WriteOptions::default())
    }
}

fn score(distance: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match distance {
        DistanceMetric::Dot => dot,
        DistanceMetric::Cosine => {
            let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if na == 0.0 || nb == 0.0 {
                0.0
            } else {
                dot / (na * nb)
            }
        }
    }
}

fn not_found(name: &str) -> VectorStoreError {
    VectorStoreError::CollectionNotFound(name.to_string())
}

#[async_trait]
impl VectorStore for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn write_options(&self) -> &WriteOptions {
        &self.options
    }

    async fn health_check(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn collection_info(
        &self,
        name: &str,
    ) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| CollectionInfo {
            name: name.to_string(),
            vector_size: c.vector_size,
            distance: c.distance,
            points_count: c.points.len() as u64,
        }))
    }

    async fn create_collection(
        &self,
        name: &str,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(VectorStoreError::CollectionError(format!(
                "collection '{}' already exists",
                name
            )));
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                vector_size,
                distance,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn upsert_batch(
        &self,
        name: &str,
        points: &[StoredPoint],
    ) -> Result<(), VectorStoreError> {
        if self.take_failure() {
            return Err(VectorStoreError::ConnectionError(
                "injected write failure".to_string(),
            ));
        }

        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;
        for point in points {
            if point.vector.len() as u64 != collection.vector_size {
                return Err(VectorStoreError::DimensionMismatch {
                    collection: name.to_string(),
                    expected: collection.vector_size,
                    actual: point.vector.len() as u64,
                });
            }
        }
        for point in points {
            collection.points.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| not_found(name))?;
        if vector.len() as u64 != collection.vector_size {
            return Err(VectorStoreError::DimensionMismatch {
                collection: name.to_string(),
                expected: collection.vector_size,
                actual: vector.len() as u64,
            });
        }

        let mut hits: Vec<ScoredPoint> = collection
            .points
            .values()
            .map(|point| ScoredPoint {
                id: point.id,
                score: score(collection.distance, &vector, &point.vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| score_threshold.is_none_or(|t| hit.score >= t))
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(CmpOrdering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn delete_by_source(&self, name: &str, source: &str) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;
        collection.points.retain(|_, p| p.source() != Some(source));
        Ok(())
    }

    async fn source_exists(&self, name: &str, source: &str) -> Result<bool, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| not_found(name))?;
        Ok(collection.points.values().any(|p| p.source() == Some(source)))
    }

    async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| not_found(name))?;
        Ok(collection.points.len() as u64)
    }
}
