//! Deterministic in-process embedder for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Embedder, normalize};
use crate::error::EmbeddingError;
use crate::models::EmbedKind;

/// Hash-based embedder. Texts containing `POISON` fail, texts containing
/// `SHORT` come back one component short.
pub struct FakeEmbedder {
    dimension: usize,
    pub calls: AtomicUsize,
    failure: Option<fn() -> EmbeddingError>,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            failure: None,
        }
    }

    /// Every call fails with a model-load error.
    pub fn broken(dimension: usize) -> Self {
        Self {
            failure: Some(|| EmbeddingError::ModelLoad("weights missing".to_string())),
            ..Self::new(dimension)
        }
    }

    /// Every call fails as if the server refused the connection.
    pub fn unreachable(dimension: usize) -> Self {
        Self {
            failure: Some(|| EmbeddingError::ConnectionError("connection refused".to_string())),
            ..Self::new(dimension)
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let bytes = text.as_bytes();
        let raw: Vec<f32> = (0..self.dimension)
            .map(|d| {
                let b = bytes.get(d % bytes.len().max(1)).copied().unwrap_or(0) as f32;
                b + (d as f32) + (bytes.len() as f32) * 0.5
            })
            .collect();
        normalize(&raw)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str {
        "fake-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }

    async fn embed(
        &self,
        texts: Vec<String>,
        _kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        if texts.iter().any(|t| t.contains("POISON")) {
            return Err(EmbeddingError::InferenceError("poisoned input".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = self.vector_for(t);
                if t.contains("SHORT") {
                    v.pop();
                }
                v
            })
            .collect())
    }
}
