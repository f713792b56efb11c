//! Record storage backends for ContextWeave.

pub mod in_memory;
pub mod noop;
pub mod seed;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use noop::NoopStore;
pub use seed::SeedData;
pub use vector::{cosine_similarity, top_k_by_similarity};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
