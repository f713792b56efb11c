//! Embedding service implementations for ContextWeave.
//!
//! All services implement the `contextweave_core::EmbeddingService` trait.
//! `build_from_config` picks one based on configuration.

pub mod noop;
pub mod openai_embed;
pub mod router;

pub use noop::NoopEmbedder;
pub use openai_embed::OpenAiEmbedder;
pub use router::build_from_config;
