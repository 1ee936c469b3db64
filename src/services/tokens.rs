//! Token counting for chunk sizing.

use std::path::Path;

use tokenizers::Tokenizer;
use tracing::debug;

use crate::error::ChunkError;

/// Counts tokens the way the embedding model will see them.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    fn name(&self) -> &str;
}

/// Character-ratio approximation: one token per `chars_per_token` chars, rounded up.
#[derive(Debug, Clone)]
pub struct HeuristicCounter {
    chars_per_token: usize,
}

impl HeuristicCounter {
    pub fn new(chars_per_token: u32) -> Self {
        Self {
            chars_per_token: (chars_per_token as usize).max(1),
        }
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Exact counts from a Hugging Face `tokenizer.json`.
pub struct TokenizerCounter {
    tokenizer: Tokenizer,
    fallback: HeuristicCounter,
}

impl TokenizerCounter {
    pub fn from_file(path: &Path) -> Result<Self, ChunkError> {
        let mut tokenizer = Tokenizer::from_file(path)
            .map_err(|e| ChunkError::TokenizerError(format!("{}: {}", path.display(), e)))?;
        // Counting must see the full text.
        tokenizer
            .with_truncation(None)
            .map_err(|e| ChunkError::TokenizerError(e.to_string()))?;
        tokenizer.with_padding(None);

        debug!(path = %path.display(), "loaded tokenizer for chunk sizing");
        Ok(Self {
            tokenizer,
            fallback: HeuristicCounter::default(),
        })
    }
}

impl TokenCounter for TokenizerCounter {
    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.get_ids().len(),
            Err(_) => self.fallback.count(text),
        }
    }

    fn name(&self) -> &str {
        "tokenizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_rounds_up() {
        let counter = HeuristicCounter::default();
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("1234"), 1);
        assert_eq!(counter.count("12345"), 2);
        assert_eq!(counter.count("12345678"), 2);
    }

    #[test]
    fn test_heuristic_counts_chars_not_bytes() {
        let counter = HeuristicCounter::new(2);
        assert_eq!(counter.count("ééé"), 2);
        assert_eq!(counter.name(), "heuristic");
    }

    #[test]
    fn test_tokenizer_counter_missing_file() {
        let result = TokenizerCounter::from_file(Path::new("/nonexistent/tokenizer.json"));
        assert!(matches!(result, Err(ChunkError::TokenizerError(_))));
    }
}
