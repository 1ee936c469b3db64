//! Batched embedding with per-item failure isolation.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use super::Embedder;
use crate::error::EmbeddingError;
use crate::models::{EmbedKind, EmbedOutcome, EmbeddingConfig};
use crate::utils::{RetryConfig, is_blank, with_retry};

/// Splits inputs into sub-batches, runs a bounded number of them at once and
/// reports one [`EmbedOutcome`] per input.
#[derive(Clone)]
pub struct BatchEmbedder {
    inner: Arc<dyn Embedder>,
    batch_size: usize,
    concurrency: usize,
    retry: RetryConfig,
}

impl BatchEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, batch_size: usize, concurrency: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
            retry: RetryConfig::default(),
        }
    }

    pub fn from_config(inner: Arc<dyn Embedder>, config: &EmbeddingConfig) -> Self {
        Self::new(
            inner,
            config.batch_size as usize,
            config.concurrency as usize,
        )
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    pub fn inner(&self) -> &Arc<dyn Embedder> {
        &self.inner
    }

    /// Embed documents. The result has the same length and order as `texts`.
    ///
    /// Only fatal errors (the model cannot load or the server stays unreachable)
    /// are returned as `Err`; anything else becomes [`EmbedOutcome::Failed`] for the affected text.
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<EmbedOutcome>, EmbeddingError> {
        let mut outcomes = vec![EmbedOutcome::Empty; texts.len()];

        let pending: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !is_blank(text))
            .map(|(i, text)| (i, text.clone()))
            .collect();
        let batches: Vec<Vec<(usize, String)>> =
            pending.chunks(self.batch_size).map(<[_]>::to_vec).collect();
        let total_batches = batches.len();

        let results: Vec<Vec<(usize, EmbedOutcome)>> = stream::iter(batches.into_iter().enumerate())
            .map(|(n, batch)| async move {
                debug!(batch = n + 1, total = total_batches, size = batch.len(), "embedding batch");
                self.embed_batch(batch).await
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        for (index, outcome) in results.into_iter().flatten() {
            outcomes[index] = outcome;
        }
        Ok(outcomes)
    }

    /// Embed one search query.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if is_blank(text) {
            return Err(EmbeddingError::EmptyInput);
        }

        let vector = self
            .call(vec![text.to_string()], EmbedKind::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".into()))?;

        if vector.len() != self.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    async fn embed_batch(
        &self,
        batch: Vec<(usize, String)>,
    ) -> Result<Vec<(usize, EmbedOutcome)>, EmbeddingError> {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();

        let error = match self.call(texts, EmbedKind::Document).await {
            Ok(vectors) if vectors.len() == batch.len() => {
                return Ok(batch
                    .iter()
                    .zip(vectors)
                    .map(|((index, _), vector)| (*index, self.check(vector)))
                    .collect());
            }
            Ok(vectors) => EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        if batch.len() == 1 {
            return Ok(batch
                .into_iter()
                .map(|(index, _)| {
                    (
                        index,
                        EmbedOutcome::Failed {
                            reason: error.to_string(),
                        },
                    )
                })
                .collect());
        }

        warn!(
            size = batch.len(),
            error = %error,
            "batch embedding failed, retrying items individually"
        );

        let mut outcomes = Vec::with_capacity(batch.len());
        for (index, text) in batch {
            let outcome = match self.call(vec![text], EmbedKind::Document).await {
                Ok(mut vectors) if vectors.len() == 1 => self.check(vectors.remove(0)),
                Ok(vectors) => EmbedOutcome::Failed {
                    reason: format!("expected 1 embedding, got {}", vectors.len()),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => EmbedOutcome::Failed {
                    reason: e.to_string(),
                },
            };
            outcomes.push((index, outcome));
        }
        Ok(outcomes)
    }

    async fn call(
        &self,
        texts: Vec<String>,
        kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        with_retry(&self.retry, "embed", || self.inner.embed(texts.clone(), kind))
            .await
            .into_result()
    }

    fn check(&self, vector: Vec<f32>) -> EmbedOutcome {
        let expected = self.dimension();
        if vector.len() != expected {
            return EmbedOutcome::Failed {
                reason: EmbeddingError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                }
                .to_string(),
            };
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return EmbedOutcome::Failed {
                reason: "embedding contains non-finite values".to_string(),
            };
        }
        EmbedOutcome::Embedded(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::embedding::testing::FakeEmbedder;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_middle_text_is_marked_empty() {
        let fake = Arc::new(FakeEmbedder::new(8));
        let embedder = BatchEmbedder::new(fake.clone(), 8, 1);
        let outcomes = embedder
            .embed_all(&texts(&["first", "", "third"]))
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_embedded());
        assert_eq!(outcomes[1], EmbedOutcome::Empty);
        assert!(outcomes[2].is_embedded());
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_vs_alone_is_identical() {
        let fake = Arc::new(FakeEmbedder::new(16));
        let batched = BatchEmbedder::new(fake.clone(), 3, 2);
        let single = BatchEmbedder::new(fake, 1, 1);
        let inputs = texts(&["alpha", "beta", "gamma", "delta", "epsilon"]);

        let together = batched.embed_all(&inputs).await.unwrap();
        for (i, text) in inputs.iter().enumerate() {
            let alone = single.embed_all(std::slice::from_ref(text)).await.unwrap();
            let a = together[i].vector().unwrap();
            let b = alone[0].vector().unwrap();
            assert!(a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1e-5));
        }
    }

    #[tokio::test]
    async fn test_order_preserved_across_concurrent_batches() {
        let fake = Arc::new(FakeEmbedder::new(4));
        let embedder = BatchEmbedder::new(fake.clone(), 2, 3);
        let inputs: Vec<String> = (0..11).map(|i| format!("text number {i}")).collect();

        let outcomes = embedder.embed_all(&inputs).await.unwrap();
        for (text, outcome) in inputs.iter().zip(&outcomes) {
            assert_eq!(outcome.vector().unwrap(), fake.vector_for(text).as_slice());
        }
        assert_eq!(fake.call_count(), 6);
    }

    #[tokio::test]
    async fn test_poisoned_item_does_not_fail_neighbours() {
        let fake = Arc::new(FakeEmbedder::new(4));
        let embedder = BatchEmbedder::new(fake, 4, 1);
        let outcomes = embedder
            .embed_all(&texts(&["ok one", "POISON pill", "ok two", "ok three"]))
            .await
            .unwrap();

        assert!(outcomes[0].is_embedded());
        assert!(matches!(&outcomes[1], EmbedOutcome::Failed { reason } if reason.contains("poisoned")));
        assert!(outcomes[2].is_embedded());
        assert!(outcomes[3].is_embedded());
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_failed() {
        let fake = Arc::new(FakeEmbedder::new(4));
        let embedder = BatchEmbedder::new(fake, 4, 1);
        let outcomes = embedder
            .embed_all(&texts(&["fine", "SHORT vector"]))
            .await
            .unwrap();

        assert!(outcomes[0].is_embedded());
        assert!(matches!(&outcomes[1], EmbedOutcome::Failed { reason } if reason.contains("dimension")));
    }

    #[tokio::test]
    async fn test_model_load_failure_is_fatal() {
        let embedder = BatchEmbedder::new(Arc::new(FakeEmbedder::broken(4)), 4, 1);
        let err = embedder.embed_all(&texts(&["a", "b"])).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unreachable_server_stops_after_first_batch() {
        let fake = Arc::new(FakeEmbedder::unreachable(4));
        let embedder = BatchEmbedder::new(fake.clone(), 2, 1).with_retry(
            RetryConfig::new(2).with_initial_delay(std::time::Duration::from_millis(1)),
        );

        let err = embedder
            .embed_all(&texts(&["a", "b", "c", "d", "e", "f"]))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::ConnectionError(_)));
        assert!(err.is_fatal());
        // one batch, retried once, never split into single items
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test]
    async fn test_embed_query() {
        let fake = Arc::new(FakeEmbedder::new(6));
        let embedder = BatchEmbedder::new(fake.clone(), 4, 1);

        let vector = embedder.embed_query("how to retry").await.unwrap();
        assert_eq!(vector, fake.vector_for("how to retry"));
        assert!(matches!(
            embedder.embed_query("   ").await,
            Err(EmbeddingError::EmptyInput)
        ));
    }
}
