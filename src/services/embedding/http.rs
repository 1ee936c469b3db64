//! Client for a remote text-embeddings server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, prepare_inputs};
use crate::error::EmbeddingError;
use crate::models::{EmbedKind, EmbeddingConfig};

/// Instruction type sent alongside the inputs.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum InstructionType {
    Document,
    Query,
}

impl From<EmbedKind> for InstructionType {
    fn from(kind: EmbedKind) -> Self {
        match kind {
            EmbedKind::Document => InstructionType::Document,
            EmbedKind::Query => InstructionType::Query,
        }
    }
}

/// Request body for the /embed endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest {
    inputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
    instruction_type: InstructionType,
}

/// Response from the /embed endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

/// Health response from the /health endpoint.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

/// Embedder backed by `POST /embed` on a text-embeddings server.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    query_prefix: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension as usize,
            query_prefix: config.query_prefix.clone(),
        })
    }

    /// Get the base URL of the embedding server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query `/health`. An empty or non-JSON 200 body counts as healthy.
    pub async fn health(&self) -> Result<HealthResponse, EmbeddingError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmbeddingError::ServerError(format!(
                "health check failed with status: {}",
                response.status()
            )));
        }

        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&text).unwrap_or(HealthResponse {
            status: Some("healthy".to_string()),
            model_id: None,
        }))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(
        &self,
        texts: Vec<String>,
        kind: EmbedKind,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest {
            inputs: prepare_inputs(texts, kind, self.query_prefix.as_deref()),
            truncate: Some(true),
            instruction_type: kind.into(),
        };

        debug!(url = %url, inputs = expected, "sending embed request");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::ConnectionError(e.to_string())
                } else {
                    EmbeddingError::RequestError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if embed_response.0.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                embed_response.0.len()
            )));
        }

        Ok(embed_response.0)
    }

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        self.health().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = EmbeddingConfig::default();
        let embedder = HttpEmbedder::new(&config).unwrap();
        assert_eq!(embedder.dimension(), config.dimension as usize);
        assert_eq!(embedder.model_id(), config.model);
    }

    #[test]
    fn test_base_url_trimming() {
        let config = EmbeddingConfig {
            url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        assert_eq!(embedder.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbedRequest {
            inputs: vec!["a".to_string()],
            truncate: Some(true),
            instruction_type: EmbedKind::Query.into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instruction_type"], "query");
        assert_eq!(json["inputs"][0], "a");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let config = EmbeddingConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        let err = embedder
            .embed(vec!["text".to_string()], EmbedKind::Document)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout
        ));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let config = EmbeddingConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        let result = embedder.embed(Vec::new(), EmbedKind::Document).await.unwrap();
        assert!(result.is_empty());
    }
}
