//! Relevance resolver: vector → keyword → recency.
//!
//! Each tier is a [`RankingTier`] tried in order; the first one that
//! produces a ranking wins. A tier that cannot rank (service down, no
//! vectors, nothing matched, deadline hit) reports itself unavailable and
//! the next tier runs. The final recency tier always succeeds, so
//! resolution never fails.
//!
//! Whatever tier wins, the result is topped up to `K` with the most recent
//! candidates it did not rank.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contextweave_core::embedding::{DEFAULT_KEYWORD_COUNT, EmbeddingService};
use contextweave_core::keywords;
use contextweave_core::record::Record;
use contextweave_store::vector::top_k_by_similarity;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

/// Borrowed view of one rankable record.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub created_at: DateTime<Utc>,
    pub embedding: Option<&'a [f32]>,
}

impl<'a> Candidate<'a> {
    pub fn from_record<R: Record>(record: &'a R) -> Self {
        Self {
            title: record.title(),
            body: record.body(),
            created_at: record.created_at(),
            embedding: record.embedding(),
        }
    }
}

/// A candidate index with its tier score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub index: usize,
    pub score: f32,
}

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    Vector,
    Keyword,
    Recency,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Recency => "recency",
        }
    }
}

impl std::fmt::Display for TierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs shared by every tier for one pool.
pub struct RankingRequest<'a> {
    pub query: &'a str,
    pub candidates: &'a [Candidate<'a>],
    pub limit: usize,
    /// Minimum cosine similarity for the vector tier.
    pub threshold: f32,
    pub deadline: Instant,
}

/// One ranking strategy.
#[async_trait]
pub trait RankingTier: Send + Sync {
    fn kind(&self) -> TierKind;

    /// Rank candidates, best first, at most `request.limit` entries.
    /// `None` means this tier is unavailable for the request.
    async fn rank(&self, request: &RankingRequest<'_>) -> Option<Vec<Ranked>>;
}

/// Cosine similarity between an embedded query and precomputed candidate vectors.
pub struct VectorTier {
    embedder: Arc<dyn EmbeddingService>,
}

impl VectorTier {
    pub fn new(embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl RankingTier for VectorTier {
    fn kind(&self) -> TierKind {
        TierKind::Vector
    }

    async fn rank(&self, request: &RankingRequest<'_>) -> Option<Vec<Ranked>> {
        let with_vectors: Vec<(usize, &[f32])> = request
            .candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.embedding.filter(|e| !e.is_empty()).map(|e| (i, e)))
            .collect();
        if with_vectors.is_empty() {
            debug!("Vector tier: no candidate carries an embedding");
            return None;
        }

        let query_vector = match timeout_at(request.deadline, self.embedder.embed(request.query))
            .await
        {
            Ok(Ok(Some(v))) if !v.is_empty() => v,
            Ok(Ok(_)) => {
                debug!(service = self.embedder.name(), "Vector tier: no query embedding");
                return None;
            }
            Ok(Err(e)) => {
                debug!(service = self.embedder.name(), error = %e, "Vector tier: embedding failed");
                return None;
            }
            Err(_) => {
                debug!(service = self.embedder.name(), "Vector tier: embedding hit the deadline");
                return None;
            }
        };

        let scored = top_k_by_similarity(
            &query_vector,
            with_vectors,
            request.limit,
            request.threshold,
        );
        if scored.is_empty() {
            debug!(threshold = request.threshold, "Vector tier: nothing cleared the threshold");
            return None;
        }
        Some(
            scored
                .into_iter()
                .map(|(index, score)| Ranked { index, score })
                .collect(),
        )
    }
}

/// Fraction of query keywords found in each candidate's title and body.
pub struct KeywordTier {
    embedder: Arc<dyn EmbeddingService>,
}

impl KeywordTier {
    pub fn new(embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { embedder }
    }

    async fn keywords(&self, query: &str, deadline: Instant) -> Vec<String> {
        let remote = match timeout_at(deadline, self.embedder.extract_keywords(query)).await {
            Ok(Ok(k)) => normalize_keywords(k),
            Ok(Err(e)) => {
                debug!(error = %e, "Keyword service failed, extracting locally");
                Vec::new()
            }
            Err(_) => {
                debug!("Keyword service hit the deadline, extracting locally");
                Vec::new()
            }
        };
        if remote.is_empty() {
            keywords::extract_keywords(query, DEFAULT_KEYWORD_COUNT)
        } else {
            remote
        }
    }
}

fn normalize_keywords(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

/// Share of `keywords` present in `text`. Single words must match a whole
/// token; phrases match as substrings.
pub fn keyword_score(keywords: &[String], text: &str) -> f32 {
    if keywords.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let tokens: HashSet<String> = keywords::tokenize(&lowered).into_iter().collect();
    let matched = keywords
        .iter()
        .filter(|k| {
            if k.contains(char::is_whitespace) {
                lowered.contains(k.as_str())
            } else {
                tokens.contains(k.as_str())
            }
        })
        .count();
    matched as f32 / keywords.len() as f32
}

#[async_trait]
impl RankingTier for KeywordTier {
    fn kind(&self) -> TierKind {
        TierKind::Keyword
    }

    async fn rank(&self, request: &RankingRequest<'_>) -> Option<Vec<Ranked>> {
        let keywords = self.keywords(request.query, request.deadline).await;
        if keywords.is_empty() {
            debug!("Keyword tier: query has no keywords");
            return None;
        }

        let mut ranked: Vec<Ranked> = request
            .candidates
            .iter()
            .enumerate()
            .filter_map(|(index, c)| {
                let score = keyword_score(&keywords, &format!("{} {}", c.title, c.body));
                (score > 0.0).then_some(Ranked { index, score })
            })
            .collect();
        if ranked.is_empty() {
            debug!(keywords = ?keywords, "Keyword tier: no candidate matched");
            return None;
        }

        let candidates = request.candidates;
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| candidates[b.index].created_at.cmp(&candidates[a.index].created_at))
                .then_with(|| a.index.cmp(&b.index))
        });
        ranked.truncate(request.limit);
        Some(ranked)
    }
}

/// The most recent candidates. Always available.
pub struct RecencyTier;

#[async_trait]
impl RankingTier for RecencyTier {
    fn kind(&self) -> TierKind {
        TierKind::Recency
    }

    async fn rank(&self, request: &RankingRequest<'_>) -> Option<Vec<Ranked>> {
        Some(
            recency_order(request.candidates, &HashSet::new())
                .into_iter()
                .take(request.limit)
                .map(|index| Ranked { index, score: 0.0 })
                .collect(),
        )
    }
}

/// Indices not in `skip`, newest first, ties by index.
fn recency_order(candidates: &[Candidate<'_>], skip: &HashSet<usize>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).filter(|i| !skip.contains(i)).collect();
    order.sort_by(|&a, &b| {
        candidates[b]
            .created_at
            .cmp(&candidates[a].created_at)
            .then_with(|| a.cmp(&b))
    });
    order
}

/// Outcome of resolving one pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub tier: TierKind,
    /// Candidate indices: ranked first, then recency backfill. At most `K`.
    pub order: Vec<usize>,
    /// How many leading entries of `order` the winning tier ranked.
    pub ranked: usize,
}

/// Ordered chain of ranking tiers.
pub struct RelevanceResolver {
    tiers: Vec<Box<dyn RankingTier>>,
    top_k: usize,
}

impl RelevanceResolver {
    pub fn new(tiers: Vec<Box<dyn RankingTier>>, top_k: usize) -> Self {
        Self { tiers, top_k }
    }

    /// Vector, then keyword, then recency, all backed by `embedder`.
    pub fn standard(embedder: Arc<dyn EmbeddingService>, top_k: usize) -> Self {
        Self::new(
            vec![
                Box::new(VectorTier::new(embedder.clone())),
                Box::new(KeywordTier::new(embedder)),
                Box::new(RecencyTier),
            ],
            top_k,
        )
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Rank `candidates` against `query`. Never fails.
    pub async fn resolve(
        &self,
        query: &str,
        candidates: &[Candidate<'_>],
        threshold: f32,
        deadline: Instant,
    ) -> Resolution {
        let limit = self.top_k.min(candidates.len());
        if limit == 0 {
            return Resolution {
                tier: TierKind::Recency,
                order: Vec::new(),
                ranked: 0,
            };
        }

        let request = RankingRequest {
            query,
            candidates,
            limit,
            threshold,
            deadline,
        };

        let mut winner = None;
        for tier in &self.tiers {
            match tier.rank(&request).await {
                Some(ranked) if !ranked.is_empty() => {
                    winner = Some((tier.kind(), ranked));
                    break;
                }
                _ => debug!(tier = %tier.kind(), "Tier unavailable, falling through"),
            }
        }
        let (tier, ranked) = winner.unwrap_or((TierKind::Recency, Vec::new()));

        let mut seen = HashSet::new();
        let mut order: Vec<usize> = ranked
            .iter()
            .map(|r| r.index)
            .filter(|&i| i < candidates.len() && seen.insert(i))
            .take(limit)
            .collect();
        let ranked_count = order.len();

        let backfill = recency_order(candidates, &seen);
        order.extend(backfill.into_iter().take(limit - ranked_count));

        debug!(tier = %tier, ranked = ranked_count, total = order.len(), "Relevance resolved");
        Resolution {
            tier,
            order,
            ranked: ranked_count,
        }
    }
}

/// Reorder `items` by `order`, dropping everything not listed.
pub fn apply_order<T>(items: Vec<T>, order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect()
}
