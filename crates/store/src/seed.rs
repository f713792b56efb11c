//! Seed data: one user's records in a flat, serde-friendly shape.
//!
//! This is the JSON format accepted by `contextweave import` and the way
//! tests populate the in-memory backend.

use chrono::{DateTime, Utc};
use contextweave_core::record::{
    Action, Connection, Document, Experiment, GeneratedArtifact, IdentityProfile, Insight, Record,
    Topic,
};
use contextweave_core::store::{RecordQuery, SortOrder};
use serde::{Deserialize, Serialize};

/// Everything stored for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityProfile>,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub experiments: Vec<Experiment>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub artifacts: Vec<GeneratedArtifact>,
}

impl SeedData {
    /// Parse seed data from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn record_count(&self) -> usize {
        self.insights.len()
            + self.documents.len()
            + self.experiments.len()
            + self.actions.len()
            + self.topics.len()
            + self.connections.len()
            + self.artifacts.len()
    }
}

/// Apply a [`RecordQuery`] to an in-memory list.
///
/// `at` picks the timestamp used for both the `since` filter and ordering;
/// ties are broken by id so results are stable.
pub fn apply_query<T, F>(items: &[T], query: &RecordQuery, at: F) -> Vec<T>
where
    T: Record + Clone,
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut selected: Vec<&T> = items
        .iter()
        .filter(|item| query.since.is_none_or(|since| at(*item) >= since))
        .collect();

    selected.sort_by(|a, b| {
        let by_time = match query.order {
            SortOrder::NewestFirst => at(*b).cmp(&at(*a)),
            SortOrder::OldestFirst => at(*a).cmp(&at(*b)),
        };
        by_time.then_with(|| a.id().cmp(b.id()))
    });

    selected
        .into_iter()
        .take(query.limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn topic(id: &str, days_ago: i64) -> Topic {
        Topic {
            id: id.into(),
            title: format!("topic {id}"),
            body: String::new(),
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn newest_first_with_limit() {
        let items = vec![topic("a", 3), topic("b", 1), topic("c", 2)];
        let out = apply_query(&items, &RecordQuery::recent(2), |t| t.created_at);
        let ids: Vec<&str> = out.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn oldest_first_ordering() {
        let items = vec![topic("a", 3), topic("b", 1), topic("c", 2)];
        let query = RecordQuery {
            limit: 10,
            order: SortOrder::OldestFirst,
            since: None,
        };
        let out = apply_query(&items, &query, |t| t.created_at);
        let ids: Vec<&str> = out.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn since_filters_old_rows() {
        let items = vec![topic("old", 40), topic("new", 5)];
        let query = RecordQuery::recent(10).since(Utc::now() - Duration::days(30));
        let out = apply_query(&items, &query, |t| t.created_at);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "new");
    }

    #[test]
    fn parses_minimal_json() {
        let seed = SeedData::from_json(
            r#"{
                "identity": {"statement": "building a fitness brand"},
                "topics": [{"id": "t1", "title": "fitness", "created_at": "2026-10-01T00:00:00Z"}]
            }"#,
        )
        .unwrap();
        assert_eq!(seed.record_count(), 1);
        assert_eq!(
            seed.identity.unwrap().statement.as_deref(),
            Some("building a fitness brand")
        );
    }
}
