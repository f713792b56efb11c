//! No-op embedding service. Disables the vector tier entirely.

use async_trait::async_trait;
use contextweave_core::embedding::EmbeddingService;
use contextweave_core::error::EmbeddingError;

/// An embedding service that never produces vectors.
///
/// Keyword extraction still works through the trait's local default, so
/// the relevance resolver lands on the keyword tier.
pub struct NoopEmbedder;

#[async_trait]
impl EmbeddingService for NoopEmbedder {
    fn name(&self) -> &str {
        "none"
    }

    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        Ok(None)
    }
}
