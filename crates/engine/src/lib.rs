//! The context aggregation engine, the heart of ContextWeave.
//!
//! A request flows through fixed stages, each depending only on the
//! previous one:
//!
//! 1. **Fetch** every category concurrently ([`fetcher`])
//! 2. **Compact**: drop low-signal items, order deterministically ([`compactor`])
//! 3. **Resolve relevance** against the identity statement, when asked ([`relevance`])
//! 4. **Collect exclusions** the consumer must not repeat ([`ledger`])
//! 5. **Allocate** the token budget by the consumer's profile ([`budget`], [`profiles`])
//! 6. **Format** the bounded [`ContextPack`] ([`pack`])
//!
//! [`ContextEngine`] wires the stages together.

pub mod budget;
pub mod compactor;
pub mod engine;
pub mod fetcher;
pub mod ledger;
pub mod pack;
pub mod profiles;
pub mod relevance;

#[cfg(test)]
pub(crate) mod test_support;

pub use budget::{TokenAllocation, allocate, estimate_tokens};
pub use compactor::{CompactContext, CompactionRules, compact};
pub use engine::{BuildOptions, ContextEngine, EngineSettings};
pub use fetcher::{FetchPlan, Fetcher};
pub use ledger::DedupLedger;
pub use pack::{
    ContextPack, DropReason, DropRecord, PackFormatter, PackGroup, PackMetadata, PackSection,
    RelevanceRecord, SectionKind, SectionStats,
};
pub use profiles::{Category, ProfileRegistry, WeightProfile};
pub use relevance::{RankingTier, RelevanceResolver, Resolution, TierKind};
