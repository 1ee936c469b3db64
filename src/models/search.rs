//! Search-related models for queries and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::point::ScoredPoint;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A semantic search request against one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub collection: String,
    pub limit: u32,
    /// Results scoring below this are dropped.
    pub min_score: Option<f32>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection: collection.into(),
            limit: 5,
            min_score: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }
}

/// A single search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub point_id: u64,
    pub chunk_id: Option<String>,
    pub score: f32,
    pub text: String,
    pub source: String,
    pub title: Option<String>,
    pub chunk_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
}

impl From<ScoredPoint> for SearchResult {
    fn from(point: ScoredPoint) -> Self {
        let payload = &point.payload;
        let string = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            point_id: point.id,
            chunk_id: string("chunk_id"),
            score: point.score,
            text: string("text")
                .or_else(|| string("content"))
                .unwrap_or_default(),
            source: string("source").unwrap_or_else(|| "unknown".to_string()),
            title: string("title"),
            chunk_index: payload.get("chunk_index").and_then(Value::as_u64),
            headings: payload
                .get("headings")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Collection of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub collection: String,
    pub results: Vec<SearchResult>,
    pub duration_ms: u64,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("retry backoff", "docs")
            .with_limit(20)
            .with_min_score(Some(0.7));

        assert_eq!(query.collection, "docs");
        assert_eq!(query.limit, 20);
        assert_eq!(query.min_score, Some(0.7));
    }

    #[test]
    fn test_search_result_from_payload() {
        let point = ScoredPoint {
            id: 7,
            score: 0.91,
            payload: json!({
                "text": "Use exponential backoff.",
                "source": "guides/retry.md",
                "chunk_index": 2,
                "chunk_id": "docs:guides_retry.md:chunk:2",
                "headings": ["Retry", "Backoff"]
            })
            .as_object()
            .cloned()
            .unwrap(),
        };
        let result = SearchResult::from(point);

        assert_eq!(result.source, "guides/retry.md");
        assert_eq!(result.chunk_index, Some(2));
        assert_eq!(result.headings, vec!["Retry", "Backoff"]);
        assert_eq!(result.title, None);
    }
}
