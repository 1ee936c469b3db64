use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Similarity function of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" => Ok(DistanceMetric::Dot),
            _ => Err(format!("unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Dot => write!(f, "dot"),
        }
    }
}

/// Map a chunk id to a 63-bit point id.
///
/// First 8 bytes of SHA-256, big-endian, modulo 2^63.
pub fn point_id(chunk_id: &str) -> u64 {
    let hash = Sha256::digest(chunk_id.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(head) & (u64::MAX >> 1)
}

/// A vector with its payload, keyed by `point_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

impl StoredPoint {
    /// Build a point whose payload records the originating chunk id.
    pub fn new(chunk_id: &str, vector: Vec<f32>, mut payload: Map<String, Value>) -> Self {
        payload.insert("chunk_id".to_string(), Value::String(chunk_id.to_string()));
        Self {
            id: point_id(chunk_id),
            vector,
            payload,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.payload.get("source").and_then(Value::as_str)
    }
}

/// A search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub vector_size: u64,
    pub distance: DistanceMetric,
    pub points_count: u64,
}
