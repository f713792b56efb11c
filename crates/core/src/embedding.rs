//! Embedding/keyword collaborator trait.
//!
//! Both calls are best-effort. `Ok(None)`, an empty keyword list and any
//! `Err` all mean the same thing to callers: this ranking tier is unavailable.

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::keywords;

/// Default number of keywords requested from an extractor.
pub const DEFAULT_KEYWORD_COUNT: usize = 8;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// The service name (e.g., "openai", "none").
    fn name(&self) -> &str;

    /// Fixed-length semantic vector for `text`, or `None` when the service
    /// declines (quota, empty input, disabled).
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError>;

    /// Salient keywords for `text`.
    ///
    /// Defaults to the local stopword-filtered extractor.
    async fn extract_keywords(&self, text: &str) -> Result<Vec<String>, EmbeddingError> {
        Ok(keywords::extract_keywords(text, DEFAULT_KEYWORD_COUNT))
    }
}
