//! # ContextWeave Core
//!
//! Record types, collaborator traits, and error definitions for the
//! ContextWeave aggregation engine. This crate has **zero framework
//! dependencies**; it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (storage, embeddings) is a trait here.
//! Implementations live in their respective crates, which keeps the engine
//! testable with in-process stubs.

pub mod embedding;
pub mod error;
pub mod keywords;
pub mod record;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use embedding::EmbeddingService;
pub use error::{ContextError, EmbeddingError, Result, StoreError};
pub use record::{
    Action, Connection, Document, Experiment, ExperimentBuckets, ExperimentStatus,
    GeneratedArtifact, IdentityProfile, Insight, RawSnapshot, Record, SourceKind, Topic,
};
pub use store::{RecordQuery, RecordStore, SortOrder};
