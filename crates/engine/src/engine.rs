//! The aggregation pipeline.
//!
//! [`ContextEngine::build_context`] runs one request end to end:
//!
//! 1. Fetch every category concurrently while the dedup ledger reads recent
//!    actions and artifacts.
//! 2. Compact: drop low-signal items, order newest first.
//! 3. Optionally re-rank the insight and document pools against the identity
//!    statement.
//! 4. Allocate the token budget by the consumer's profile and format the pack.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contextweave_config::AggregationConfig;
use contextweave_core::embedding::EmbeddingService;
use contextweave_core::error::ContextError;
use contextweave_core::record::Record;
use contextweave_core::store::RecordStore;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::budget::{allocate, estimate_tokens};
use crate::compactor::{CompactionRules, compact};
use crate::fetcher::{FetchPlan, Fetcher};
use crate::ledger::{DEFAULT_WINDOW_DAYS, DedupLedger};
use crate::pack::{ContextPack, PackFormatter, PackMetadata, RelevanceRecord, render_sections};
use crate::profiles::{Category, ProfileRegistry};
use crate::relevance::{Candidate, RelevanceResolver, apply_order};

/// Engine-wide limits that do not vary per request.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub fetch: FetchPlan,
    /// Insight rows read when relevance search is on.
    pub insight_pool: usize,
    /// Document rows read when relevance search is on.
    pub document_pool: usize,
    pub compaction: CompactionRules,
    pub item_char_cap: usize,
    pub max_excluded: usize,
    pub ledger_window_days: u32,
    /// Cap on the identity statement, both as a query and as rendered text.
    pub query_char_cap: usize,
    pub relevance_top_k: usize,
    /// Used when a request brings no deadline of its own.
    pub deadline: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fetch: FetchPlan::default(),
            insight_pool: 500,
            document_pool: 200,
            compaction: CompactionRules::default(),
            item_char_cap: 280,
            max_excluded: 40,
            ledger_window_days: DEFAULT_WINDOW_DAYS,
            query_char_cap: 1000,
            relevance_top_k: 20,
            deadline: Duration::from_secs(8),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &AggregationConfig) -> Self {
        let fetch = &config.fetch;
        Self {
            fetch: FetchPlan {
                insights: fetch.insights,
                documents: fetch.documents,
                experiments_in_progress: fetch.experiments_in_progress,
                experiments_planning: fetch.experiments_planning,
                experiments_historical: fetch.experiments_historical,
                actions: fetch.actions,
                topics: fetch.topics,
                connections: fetch.connections,
            },
            insight_pool: fetch.insight_pool,
            document_pool: fetch.document_pool,
            compaction: CompactionRules::from_config(&config.min_body_chars),
            item_char_cap: config.item_char_cap,
            max_excluded: config.max_excluded,
            ledger_window_days: config.ledger_window_days,
            query_char_cap: config.query_char_cap,
            relevance_top_k: config.relevance_top_k,
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }
}

/// Per-request knobs.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_tokens: usize,
    pub max_items_per_category: usize,
    pub use_relevance_search: bool,
    /// Bound on the whole request. Defaults to now + the engine deadline.
    pub deadline: Option<Instant>,
    /// Reference time for the dedup window. Defaults to the wall clock.
    pub now: Option<DateTime<Utc>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_tokens: 5000,
            max_items_per_category: 8,
            use_relevance_search: false,
            deadline: None,
            now: None,
        }
    }
}

impl BuildOptions {
    /// Request defaults taken from the `[aggregation]` config section.
    pub fn from_config(config: &AggregationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            max_items_per_category: config.max_items_per_category,
            ..Self::default()
        }
    }

    pub fn with_relevance(mut self, enabled: bool) -> Self {
        self.use_relevance_search = enabled;
        self
    }
}

/// Builds [`ContextPack`]s. Holds no per-request state; share it behind an `Arc`.
pub struct ContextEngine {
    store: Arc<dyn RecordStore>,
    resolver: RelevanceResolver,
    registry: Arc<ProfileRegistry>,
    settings: EngineSettings,
}

impl ContextEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingService>,
        registry: Arc<ProfileRegistry>,
        settings: EngineSettings,
    ) -> Self {
        let resolver = RelevanceResolver::standard(embedder, settings.relevance_top_k);
        Self {
            store,
            resolver,
            registry,
            settings,
        }
    }

    /// Replace the standard tier chain.
    pub fn with_resolver(mut self, resolver: RelevanceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Build the context pack for `user_id` as seen by `consumer`.
    ///
    /// Unknown consumers get the `default` profile. The only error is an
    /// unreachable store; every other failure shrinks the pack instead.
    pub async fn build_context(
        &self,
        user_id: &str,
        consumer: &str,
        options: BuildOptions,
    ) -> Result<ContextPack, ContextError> {
        let request_id = Uuid::new_v4();
        let now = options.now.unwrap_or_else(Utc::now);
        let deadline = options
            .deadline
            .unwrap_or_else(|| Instant::now() + self.settings.deadline);
        let profile = self.registry.resolve(consumer);

        info!(
            %request_id,
            user_id,
            consumer,
            profile = profile.name(),
            max_tokens = options.max_tokens,
            relevance = options.use_relevance_search,
            "Building context"
        );

        let mut plan = self.settings.fetch.clone();
        if options.use_relevance_search {
            plan.insights = plan.insights.max(self.settings.insight_pool);
            plan.documents = plan.documents.max(self.settings.document_pool);
        }

        let fetcher = Fetcher::new(self.store.clone());
        let ledger = DedupLedger::new(self.store.clone())
            .artifact_kind(profile.artifact_kind())
            .deadline(deadline);
        let (snapshot, excluded) = tokio::join!(
            fetcher.fetch(user_id, &plan, deadline),
            ledger.excluded_titles(user_id, self.settings.ledger_window_days, now),
        );
        let mut ctx = compact(snapshot?, &self.settings.compaction);

        let mut relevance = Vec::new();
        if options.use_relevance_search {
            let query = ctx
                .identity
                .statement_text()
                .map(|s| relevance_query(s, self.settings.query_char_cap));
            match query {
                Some(query) => {
                    let threshold = profile.relevance_threshold();
                    let (insights, record) = self
                        .rank_pool(Category::Insights, &query, std::mem::take(&mut ctx.insights), threshold, deadline)
                        .await;
                    ctx.insights = insights;
                    relevance.push(record);

                    let (documents, record) = self
                        .rank_pool(Category::Documents, &query, std::mem::take(&mut ctx.documents), threshold, deadline)
                        .await;
                    ctx.documents = documents;
                    relevance.push(record);
                }
                None => debug!(user_id, "No identity statement, keeping recency order"),
            }
        }

        let allocation = allocate(profile, options.max_tokens);
        let formatter = PackFormatter {
            max_items_per_category: options.max_items_per_category,
            item_char_cap: self.settings.item_char_cap,
            identity_char_cap: self.settings.query_char_cap,
            max_excluded: self.settings.max_excluded,
        };
        let formatted = formatter.format(&ctx, &allocation, &excluded);
        let estimated_tokens = estimate_tokens(&render_sections(&formatted.sections));

        info!(
            %request_id,
            user_id,
            sections = formatted.sections.len(),
            excluded = formatted.excluded.len(),
            estimated_tokens,
            degraded = ctx.degraded.len(),
            "Context built"
        );

        Ok(ContextPack {
            sections: formatted.sections,
            excluded: formatted.excluded,
            metadata: PackMetadata {
                request_id,
                consumer: consumer.to_string(),
                profile: profile.name().to_string(),
                max_tokens: options.max_tokens,
                estimated_tokens,
                generated_at: now,
                allocation,
                sections: formatted.stats,
                drops: formatted.drops,
                relevance,
                degraded: ctx.degraded,
            },
        })
    }

    async fn rank_pool<T: Record + Sync>(
        &self,
        pool: Category,
        query: &str,
        items: Vec<T>,
        threshold: f32,
        deadline: Instant,
    ) -> (Vec<T>, RelevanceRecord) {
        let candidates: Vec<Candidate<'_>> = items.iter().map(Candidate::from_record).collect();
        let resolution = self
            .resolver
            .resolve(query, &candidates, threshold, deadline)
            .await;

        let record = RelevanceRecord {
            pool,
            tier: resolution.tier,
            ranked: resolution.ranked,
            candidates: items.len(),
        };
        (apply_order(items, &resolution.order), record)
    }
}

/// The statement as sent to the embedding collaborator: capped at `cap`
/// chars, without the ellipsis rendered text gets.
fn relevance_query(statement: &str, cap: usize) -> String {
    statement.chars().take(cap).collect()
}
