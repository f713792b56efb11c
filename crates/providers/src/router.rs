//! Embedding service selection from configuration.

use std::sync::Arc;
use std::time::Duration;

use contextweave_config::EmbeddingConfig;
use contextweave_core::embedding::EmbeddingService;
use tracing::{info, warn};

use crate::noop::NoopEmbedder;
use crate::openai_embed::OpenAiEmbedder;

/// Build the configured embedding service.
///
/// Misconfiguration never fails startup: an unknown provider, a missing
/// key or an unbuildable client all fall back to [`NoopEmbedder`], which
/// leaves relevance ranking on the keyword tier.
pub fn build_from_config(config: &EmbeddingConfig) -> Arc<dyn EmbeddingService> {
    match config.provider.as_str() {
        "none" => Arc::new(NoopEmbedder),
        "openai" | "openai_compat" => {
            let Some(api_key) = config.api_key.clone() else {
                warn!("Embedding provider 'openai' has no API key; vector relevance disabled");
                return Arc::new(NoopEmbedder);
            };
            match OpenAiEmbedder::new(
                &config.provider,
                &config.api_url,
                api_key,
                &config.model,
                Duration::from_secs(config.timeout_secs),
            ) {
                Ok(embedder) => {
                    info!(url = %config.api_url, model = %config.model, "Embedding service ready");
                    Arc::new(embedder)
                }
                Err(e) => {
                    warn!(error = %e, "Embedding client unavailable; vector relevance disabled");
                    Arc::new(NoopEmbedder)
                }
            }
        }
        other => {
            warn!(provider = other, "Unknown embedding provider; vector relevance disabled");
            Arc::new(NoopEmbedder)
        }
    }
}
