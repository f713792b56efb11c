//! Short-term deduplication ledger.
//!
//! Collects titles the consumer must not repeat: actions the user completed
//! recently and artifacts a consumer already generated. The ledger never
//! filters content sections; it is rendered as its own section.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use contextweave_core::error::StoreError;
use contextweave_core::store::{RecordQuery, RecordStore};
use tokio::time::{Instant, timeout_at};
use tracing::warn;

/// Upper bound on rows read per ledger source.
pub const LEDGER_LOOKUP_LIMIT: usize = 200;

/// Default look-back window.
pub const DEFAULT_WINDOW_DAYS: u32 = 45;

pub struct DedupLedger {
    store: Arc<dyn RecordStore>,
    artifact_kind: Option<String>,
    deadline: Option<Instant>,
}

impl DedupLedger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            artifact_kind: None,
            deadline: None,
        }
    }

    /// Only count artifacts of this kind. Without one, every kind counts.
    pub fn artifact_kind(mut self, kind: Option<&str>) -> Self {
        self.artifact_kind = kind.map(str::to_string);
        self
    }

    /// Abandon ledger reads still running at `deadline`.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Titles performed or generated within `window_days` before `now`,
    /// newest first.
    ///
    /// Trimmed and deduplicated case-insensitively; the most recent spelling
    /// wins. Equal timestamps keep actions ahead of artifacts. A source that
    /// fails or misses the deadline contributes nothing, never an error.
    pub async fn excluded_titles(
        &self,
        user_id: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let since = now - Duration::days(i64::from(window_days));
        let query = RecordQuery::recent(LEDGER_LOOKUP_LIMIT).since(since);

        let (actions, artifacts) = tokio::join!(
            self.bounded("actions", user_id, self.store.actions(user_id, &query)),
            self.bounded(
                "artifacts",
                user_id,
                self.store
                    .artifacts(user_id, self.artifact_kind.as_deref(), &query),
            ),
        );

        let in_window = |at: DateTime<Utc>| at >= since && at <= now;
        let mut entries: Vec<(DateTime<Utc>, String)> = Vec::new();
        entries.extend(
            actions
                .into_iter()
                .flatten()
                .filter(|a| in_window(a.performed_at()))
                .map(|a| (a.performed_at(), a.title)),
        );
        entries.extend(
            artifacts
                .into_iter()
                .flatten()
                .filter(|a| in_window(a.created_at))
                .map(|a| (a.created_at, a.title)),
        );
        entries.sort_by(|a, b| b.0.cmp(&a.0));

        dedup_titles(entries.into_iter().map(|(_, title)| title))
    }

    /// One ledger source under the deadline. Errors and late reads log and
    /// yield `None`.
    async fn bounded<T>(
        &self,
        source: &'static str,
        user_id: &str,
        read: impl Future<Output = Result<T, StoreError>>,
    ) -> Option<T> {
        let result = match self.deadline {
            Some(deadline) => match timeout_at(deadline, read).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(user_id, source, "Ledger read missed the deadline, skipping");
                    return None;
                }
            },
            None => read.await,
        };
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(user_id, source, error = %e, "Ledger read failed, skipping");
                None
            }
        }
    }
}

fn dedup_titles(titles: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    titles
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedStore, action, artifact, now};
    use contextweave_store::SeedData;
    use std::time::Duration as StdDuration;

    async fn ledger_store(data: SeedData) -> Arc<ScriptedStore> {
        Arc::new(ScriptedStore::seeded("u1", data).await)
    }

    #[tokio::test]
    async fn recent_action_is_excluded() {
        let store = ledger_store(SeedData {
            actions: vec![action("a1", "Applied to 5 jobs", 3)],
            ..SeedData::default()
        })
        .await;
        let titles = DedupLedger::new(store).excluded_titles("u1", 30, now()).await;
        assert!(titles.contains(&"Applied to 5 jobs".to_string()));
    }

    #[tokio::test]
    async fn actions_and_artifacts_interleave_by_recency() {
        let store = ledger_store(SeedData {
            actions: vec![action("a1", "Applied to 5 jobs", 5), action("a2", "Stretched", 1)],
            artifacts: vec![artifact("g1", "daily_suggestion", "Film a reel", 3)],
            ..SeedData::default()
        })
        .await;
        let titles = DedupLedger::new(store).excluded_titles("u1", 45, now()).await;
        assert_eq!(titles, vec!["Stretched", "Film a reel", "Applied to 5 jobs"]);
    }

    #[tokio::test]
    async fn actions_outside_window_are_ignored() {
        let store = ledger_store(SeedData {
            actions: vec![action("old", "Ran a marathon", 60), action("new", "Stretched", 2)],
            ..SeedData::default()
        })
        .await;
        let titles = DedupLedger::new(store).excluded_titles("u1", 45, now()).await;
        assert_eq!(titles, vec!["Stretched"]);
    }

    #[tokio::test]
    async fn artifacts_filter_by_kind() {
        let store = ledger_store(SeedData {
            artifacts: vec![
                artifact("g1", "daily_suggestion", "Film a reel", 1),
                artifact("g2", "weekly_reflection", "Review the week", 1),
            ],
            ..SeedData::default()
        })
        .await;

        let daily = DedupLedger::new(store.clone())
            .artifact_kind(Some("daily_suggestion"))
            .excluded_titles("u1", 45, now())
            .await;
        assert_eq!(daily.len(), 1);
        assert!(daily.contains(&"Film a reel".to_string()));

        let all = DedupLedger::new(store).excluded_titles("u1", 45, now()).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn titles_are_trimmed_deduped_newest_first() {
        let store = ledger_store(SeedData {
            actions: vec![
                action("a1", "  Walk the dog ", 1),
                action("a2", "walk the DOG", 2),
                action("a3", "Call mom", 3),
            ],
            artifacts: vec![artifact("g1", "daily_suggestion", "Walk The Dog", 1)],
            ..SeedData::default()
        })
        .await;
        let titles = DedupLedger::new(store).excluded_titles("u1", 45, now()).await;
        assert_eq!(titles, vec!["Walk the dog", "Call mom"]);
    }

    #[tokio::test]
    async fn storage_errors_degrade_to_partial_or_empty() {
        let data = SeedData {
            actions: vec![action("a1", "Applied to 5 jobs", 3)],
            artifacts: vec![artifact("g1", "daily_suggestion", "Film a reel", 1)],
            ..SeedData::default()
        };
        let store = Arc::new(
            ScriptedStore::seeded("u1", data.clone())
                .await
                .failing(&["artifacts"]),
        );
        let titles = DedupLedger::new(store).excluded_titles("u1", 45, now()).await;
        assert_eq!(titles.len(), 1);

        let store = Arc::new(ScriptedStore::seeded("u1", data).await.unreachable());
        assert!(DedupLedger::new(store)
            .excluded_titles("u1", 45, now())
            .await
            .is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_slow_reads() {
        let store = Arc::new(
            ScriptedStore::seeded(
                "u1",
                SeedData {
                    actions: vec![action("a1", "Applied to 5 jobs", 3)],
                    ..SeedData::default()
                },
            )
            .await
            .slow(&["actions"], StdDuration::from_secs(60)),
        );
        let titles = DedupLedger::new(store)
            .deadline(Instant::now() + StdDuration::from_millis(50))
            .excluded_titles("u1", 45, now())
            .await;
        assert!(titles.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_artifacts_keep_recent_actions() {
        let store = Arc::new(
            ScriptedStore::seeded(
                "u1",
                SeedData {
                    actions: vec![action("a1", "Applied to 5 jobs", 3)],
                    artifacts: vec![artifact("g1", "daily_suggestion", "Film a reel", 1)],
                    ..SeedData::default()
                },
            )
            .await
            .slow(&["artifacts"], StdDuration::from_secs(60)),
        );
        let titles = DedupLedger::new(store)
            .deadline(Instant::now() + StdDuration::from_millis(50))
            .excluded_titles("u1", 30, now())
            .await;
        assert_eq!(titles, vec!["Applied to 5 jobs"]);
    }
}
