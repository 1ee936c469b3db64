//! Qdrant vector store backend implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, ScalarQuantizationBuilder, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::{Map, Number, Value};

use super::{VectorStore, WriteOptions};
use crate::error::VectorStoreError;
use crate::models::{
    CollectionInfo, DistanceMetric, ScoredPoint, StoredPoint, VectorStoreConfig,
};

/// Qdrant vector store backend.
pub struct QdrantBackend {
    client: Qdrant,
    quantization: bool,
    options: WriteOptions,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .skip_compatibility_check();

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            quantization: config.quantization,
            options: WriteOptions::from_config(config),
        })
    }
}

/// Transport failures become `ConnectionError` so callers can retry them.
fn classify(e: QdrantError, fallback: fn(String) -> VectorStoreError) -> VectorStoreError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("transport error")
        || lower.contains("connection refused")
        || lower.contains("unavailable")
        || lower.contains("deadline")
    {
        VectorStoreError::ConnectionError(msg)
    } else {
        fallback(msg)
    }
}

fn to_qdrant_distance(distance: DistanceMetric) -> Distance {
    match distance {
        DistanceMetric::Cosine => Distance::Cosine,
        DistanceMetric::Dot => Distance::Dot,
    }
}

fn from_qdrant_distance(raw: i32) -> Result<DistanceMetric, VectorStoreError> {
    match Distance::try_from(raw) {
        Ok(Distance::Cosine) => Ok(DistanceMetric::Cosine),
        Ok(Distance::Dot) => Ok(DistanceMetric::Dot),
        Ok(other) => Err(VectorStoreError::CollectionError(format!(
            "unsupported distance: {}",
            other.as_str_name()
        ))),
        Err(_) => Err(VectorStoreError::CollectionError(format!(
            "unknown distance value: {}",
            raw
        ))),
    }
}

fn source_filter(source: &str) -> Filter {
    Filter::must([Condition::matches("source", source.to_string())])
}

fn numeric_id(id: Option<PointId>) -> u64 {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(num)) => num,
        _ => 0,
    }
}

fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::IntegerValue(n)) => Value::from(n),
        Some(Kind::DoubleValue(f)) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => Value::Object(payload_to_json(s.fields)),
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload.into_iter().map(|(k, v)| (k, to_json(v))).collect()
}

#[async_trait]
impl VectorStore for QdrantBackend {
    fn backend_name(&self) -> &'static str {
        "qdrant"
    }

    fn write_options(&self) -> &WriteOptions {
        &self.options
    }

    async fn health_check(&self) -> Result<(), VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn collection_info(
        &self,
        name: &str,
    ) -> Result<Option<CollectionInfo>, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| classify(e, VectorStoreError::CollectionError))?;
        if !exists {
            return Ok(None);
        }

        let response = match self.client.collection_info(name).await {
            Ok(response) => response,
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    return Ok(None);
                }
                return Err(classify(e, VectorStoreError::CollectionError));
            }
        };

        let result = response.result.ok_or_else(|| {
            VectorStoreError::CollectionError(format!("no info returned for '{}'", name))
        })?;
        let params = result
            .config
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        match params {
            Some(VectorsConfigKind::Params(params)) => Ok(Some(CollectionInfo {
                name: name.to_string(),
                vector_size: params.size,
                distance: from_qdrant_distance(params.distance)?,
                points_count: result.points_count.unwrap_or(0),
            })),
            Some(VectorsConfigKind::ParamsMap(_)) => Err(VectorStoreError::CollectionError(
                format!("collection '{}' uses named vectors", name),
            )),
            None => Err(VectorStoreError::CollectionError(format!(
                "collection '{}' has no vector config",
                name
            ))),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        vector_size: u64,
        distance: DistanceMetric,
    ) -> Result<(), VectorStoreError> {
        let mut create = CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
            vector_size,
            to_qdrant_distance(distance),
        ));
        if self.quantization {
            create = create.quantization_config(ScalarQuantizationBuilder::default());
        }

        self.client
            .create_collection(create)
            .await
            .map_err(|e| classify(e, VectorStoreError::CollectionError))?;

        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<bool, VectorStoreError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| classify(e, VectorStoreError::CollectionError))?;
        if !exists {
            return Ok(false);
        }

        self.client
            .delete_collection(name)
            .await
            .map_err(|e| classify(e, VectorStoreError::DeleteError))?;

        Ok(true)
    }

    async fn upsert_batch(
        &self,
        name: &str,
        points: &[StoredPoint],
    ) -> Result<(), VectorStoreError> {
        let points: Vec<PointStruct> = points
            .iter()
            .map(|point| {
                let payload = Payload::try_from(Value::Object(point.payload.clone()))
                    .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
                Ok(PointStruct::new(point.id, point.vector.clone(), payload))
            })
            .collect::<Result<_, VectorStoreError>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .map_err(|e| classify(e, VectorStoreError::UpsertError))?;

        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: Vec<f32>,
        limit: u64,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>, VectorStoreError> {
        let mut search = SearchPointsBuilder::new(name, vector, limit).with_payload(true);
        if let Some(score) = score_threshold {
            search = search.score_threshold(score);
        }

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| classify(e, VectorStoreError::SearchError))?;

        Ok(response
            .result
            .into_iter()
            .filter(|point| score_threshold.is_none_or(|t| point.score >= t))
            .map(|point| ScoredPoint {
                id: numeric_id(point.id),
                score: point.score,
                payload: payload_to_json(point.payload),
            })
            .collect())
    }

    async fn delete_by_source(&self, name: &str, source: &str) -> Result<(), VectorStoreError> {
        let delete = DeletePointsBuilder::new(name)
            .points(source_filter(source))
            .wait(true);

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| classify(e, VectorStoreError::DeleteError))?;

        Ok(())
    }

    async fn source_exists(&self, name: &str, source: &str) -> Result<bool, VectorStoreError> {
        let scroll = ScrollPointsBuilder::new(name)
            .filter(source_filter(source))
            .limit(1)
            .with_payload(false)
            .with_vectors(false);

        let response = self
            .client
            .scroll(scroll)
            .await
            .map_err(|e| classify(e, VectorStoreError::SearchError))?;

        Ok(!response.result.is_empty())
    }

    async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(name).exact(true))
            .await
            .map_err(|e| classify(e, VectorStoreError::CollectionError))?;

        Ok(response.result.map_or(0, |r| r.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::{ListValue, Struct};

    #[test]
    fn test_distance_mapping() {
        assert_eq!(
            from_qdrant_distance(Distance::Cosine as i32).unwrap(),
            DistanceMetric::Cosine
        );
        assert_eq!(
            from_qdrant_distance(Distance::Dot as i32).unwrap(),
            DistanceMetric::Dot
        );
        assert!(from_qdrant_distance(Distance::Euclid as i32).is_err());
    }

    #[test]
    fn test_payload_to_json() {
        let mut fields = HashMap::new();
        fields.insert(
            "source".to_string(),
            QdrantValue {
                kind: Some(Kind::StringValue("guide.md".to_string())),
            },
        );
        fields.insert(
            "chunk_index".to_string(),
            QdrantValue {
                kind: Some(Kind::IntegerValue(3)),
            },
        );
        fields.insert(
            "headings".to_string(),
            QdrantValue {
                kind: Some(Kind::ListValue(ListValue {
                    values: vec![QdrantValue {
                        kind: Some(Kind::StringValue("Intro".to_string())),
                    }],
                })),
            },
        );
        fields.insert(
            "extra".to_string(),
            QdrantValue {
                kind: Some(Kind::StructValue(Struct {
                    fields: HashMap::new(),
                })),
            },
        );

        let json = payload_to_json(fields);
        assert_eq!(json["source"], "guide.md");
        assert_eq!(json["chunk_index"], 3);
        assert_eq!(json["headings"][0], "Intro");
        assert!(json["extra"].is_object());
    }

    #[test]
    fn test_numeric_id() {
        let id = PointId {
            point_id_options: Some(PointIdOptions::Num(42)),
        };
        assert_eq!(numeric_id(Some(id)), 42);
        assert_eq!(numeric_id(None), 0);
    }

    #[test]
    fn test_new_does_not_connect() {
        let backend = QdrantBackend::new(&VectorStoreConfig::default()).unwrap();
        assert_eq!(backend.backend_name(), "qdrant");
    }
}
