//! Compactor: quality filter and deterministic ordering.
//!
//! Turns a [`RawSnapshot`] into a [`CompactContext`]: low-signal items are
//! dropped, every list is sorted newest first (ties by title, then id) and
//! experiments are re-bucketed by status.

use contextweave_config::MinBodyConfig;
use contextweave_core::record::{
    Action, Connection, Document, ExperimentBuckets, IdentityProfile, Insight, RawSnapshot,
    Record, SourceKind, Topic,
};

/// Minimum body length (in chars, after trimming) per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionRules {
    pub min_insight_body: usize,
    pub min_document_body: usize,
    pub min_experiment_body: usize,
    pub min_action_body: usize,
    pub min_topic_body: usize,
    pub min_connection_body: usize,
}

impl Default for CompactionRules {
    fn default() -> Self {
        Self {
            min_insight_body: 20,
            min_document_body: 40,
            min_experiment_body: 0,
            min_action_body: 0,
            min_topic_body: 0,
            min_connection_body: 0,
        }
    }
}

impl CompactionRules {
    pub fn from_config(config: &MinBodyConfig) -> Self {
        Self {
            min_insight_body: config.insights,
            min_document_body: config.documents,
            min_experiment_body: config.experiments,
            min_action_body: config.actions,
            min_topic_body: config.topics,
            min_connection_body: config.connections,
        }
    }
}

/// Filtered and ordered context, not yet bounded by any budget.
#[derive(Debug, Clone, Default)]
pub struct CompactContext {
    pub identity: IdentityProfile,
    pub insights: Vec<Insight>,
    pub documents: Vec<Document>,
    pub experiments: ExperimentBuckets,
    pub actions: Vec<Action>,
    pub topics: Vec<Topic>,
    pub connections: Vec<Connection>,
    /// Carried over from the snapshot.
    pub degraded: Vec<SourceKind>,
}

/// Filter and order a snapshot.
pub fn compact(snapshot: RawSnapshot, rules: &CompactionRules) -> CompactContext {
    let RawSnapshot {
        identity,
        insights,
        documents,
        experiments,
        actions,
        topics,
        connections,
        degraded,
    } = snapshot;

    let ExperimentBuckets {
        in_progress,
        planning,
        historical,
    } = experiments;
    let all_experiments = in_progress.into_iter().chain(planning).chain(historical);
    let filtered = keep_signal(all_experiments.collect(), rules.min_experiment_body);
    let mut experiments = ExperimentBuckets::partition(filtered);
    sort_recent(&mut experiments.in_progress);
    sort_recent(&mut experiments.planning);
    sort_recent(&mut experiments.historical);

    CompactContext {
        identity,
        insights: compact_list(insights, rules.min_insight_body),
        documents: compact_list(documents, rules.min_document_body),
        experiments,
        actions: compact_list(actions, rules.min_action_body),
        topics: compact_list(topics, rules.min_topic_body),
        connections: compact_list(connections, rules.min_connection_body),
        degraded,
    }
}

fn compact_list<T: Record>(items: Vec<T>, min_body: usize) -> Vec<T> {
    let mut items = keep_signal(items, min_body);
    sort_recent(&mut items);
    items
}

fn keep_signal<T: Record>(items: Vec<T>, min_body: usize) -> Vec<T> {
    if min_body == 0 {
        return items;
    }
    items
        .into_iter()
        .filter(|item| item.body().trim().chars().count() >= min_body)
        .collect()
}

/// Newest first; ties by title, then id.
pub fn sort_recent<T: Record>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.title().cmp(b.title()))
            .then_with(|| a.id().cmp(b.id()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{days_ago, experiment, insight};
    use contextweave_core::record::{Experiment, ExperimentStatus};

    fn ids<T: Record>(items: &[T]) -> Vec<&str> {
        items.iter().map(|i| i.id()).collect()
    }

    #[test]
    fn drops_short_bodies() {
        let snapshot = RawSnapshot {
            insights: vec![
                insight("long", "Long", "This body is comfortably over twenty", 1),
                insight("short", "Short", "tiny", 1),
                insight("padded", "Padded", "      tiny but padded       ", 1),
            ],
            ..RawSnapshot::default()
        };
        let ctx = compact(snapshot, &CompactionRules::default());
        assert_eq!(ids(&ctx.insights), vec!["long"]);
    }

    #[test]
    fn zero_minimum_keeps_empty_bodies() {
        let snapshot = RawSnapshot {
            topics: vec![Topic {
                id: "t".into(),
                title: "Fitness".into(),
                body: String::new(),
                created_at: days_ago(1),
            }],
            ..RawSnapshot::default()
        };
        let ctx = compact(snapshot, &CompactionRules::default());
        assert_eq!(ctx.topics.len(), 1);
    }

    #[test]
    fn sorts_newest_first_with_stable_ties() {
        let body = "a body long enough to pass the filter";
        let snapshot = RawSnapshot {
            insights: vec![
                insight("c", "Beta", body, 5),
                insight("b", "Alpha", body, 5),
                insight("a", "Alpha", body, 5),
                insight("new", "Zeta", body, 1),
            ],
            ..RawSnapshot::default()
        };
        let ctx = compact(snapshot, &CompactionRules::default());
        assert_eq!(ids(&ctx.insights), vec!["new", "a", "b", "c"]);
    }

    #[test]
    fn rebuckets_experiments_by_status() {
        // A store that mislabels buckets still yields correct sections.
        let misfiled: Experiment = experiment("x", "Misfiled", ExperimentStatus::Completed, 3);
        let snapshot = RawSnapshot {
            experiments: ExperimentBuckets {
                in_progress: vec![
                    experiment("a", "Running", ExperimentStatus::InProgress, 2),
                    misfiled,
                ],
                planning: vec![experiment("p", "Later", ExperimentStatus::Planning, 1)],
                historical: vec![],
            },
            ..RawSnapshot::default()
        };
        let ctx = compact(snapshot, &CompactionRules::default());
        assert_eq!(ids(&ctx.experiments.in_progress), vec!["a"]);
        assert_eq!(ids(&ctx.experiments.planning), vec!["p"]);
        assert_eq!(ids(&ctx.experiments.historical), vec!["x"]);
    }

    #[test]
    fn identity_and_degraded_pass_through() {
        let snapshot = RawSnapshot {
            identity: IdentityProfile {
                statement: Some("runner".into()),
                ..IdentityProfile::default()
            },
            degraded: vec![SourceKind::Documents],
            ..RawSnapshot::default()
        };
        let ctx = compact(snapshot, &CompactionRules::default());
        assert_eq!(ctx.identity.statement_text(), Some("runner"));
        assert_eq!(ctx.degraded, vec![SourceKind::Documents]);
    }

    #[test]
    fn rules_follow_config() {
        let config = MinBodyConfig {
            insights: 5,
            documents: 10,
            experiments: 0,
            actions: 3,
            topics: 0,
            connections: 0,
        };
        let rules = CompactionRules::from_config(&config);
        assert_eq!(rules.min_insight_body, 5);
        assert_eq!(rules.min_action_body, 3);
    }
}
