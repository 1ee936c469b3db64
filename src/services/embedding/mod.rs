//! Embedding backends.
//!
//! Every backend implements [`Embedder`]. [`BatchEmbedder`] sits on top and
//! turns per-batch results into per-text [`EmbedOutcome`](crate::models::EmbedOutcome)s.

mod batch;
mod http;
mod onnx;
#[cfg(test)]
pub(crate) mod testing;

pub use batch::BatchEmbedder;
pub use http::{HealthResponse, HttpEmbedder};
pub use onnx::OnnxEmbedder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::models::{EmbedKind, EmbeddingBackend, EmbeddingConfig};

/// Turns texts into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier recorded with stored vectors.
    fn model_id(&self) -> &str;

    /// Length of every returned vector.
    fn dimension(&self) -> usize;

    /// Embed `texts`, returning one vector per input in input order.
    async fn embed(
        &self,
        texts: Vec<String>,
        kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Check that the backend can serve requests.
    async fn health_check(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }
}

/// Create the configured embedding backend.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.backend {
        EmbeddingBackend::Onnx => Ok(Arc::new(OnnxEmbedder::load(config)?)),
        EmbeddingBackend::Http => Ok(Arc::new(HttpEmbedder::new(config)?)),
    }
}

/// Apply the configured query prefix to query texts.
pub(crate) fn prepare_inputs(
    texts: Vec<String>,
    kind: EmbedKind,
    query_prefix: Option<&str>,
) -> Vec<String> {
    match (kind, query_prefix) {
        (EmbedKind::Query, Some(prefix)) => texts
            .into_iter()
            .map(|t| format!("{}{}", prefix, t))
            .collect(),
        _ => texts,
    }
}

/// L2-normalize a vector; zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_prepare_inputs_prefixes_queries_only() {
        let texts = vec!["rust".to_string()];
        assert_eq!(
            prepare_inputs(texts.clone(), EmbedKind::Query, Some("query: ")),
            vec!["query: rust"]
        );
        assert_eq!(
            prepare_inputs(texts.clone(), EmbedKind::Document, Some("query: ")),
            vec!["rust"]
        );
        assert_eq!(prepare_inputs(texts, EmbedKind::Query, None), vec!["rust"]);
    }

    #[test]
    fn test_create_embedder_onnx_without_model_is_fatal() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Onnx,
            model_path: Some("/nonexistent/model-dir".into()),
            ..Default::default()
        };
        let err = create_embedder(&config).err().unwrap();
        assert!(err.is_fatal());
    }
}
