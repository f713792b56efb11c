//! Storage collaborator trait: read-only access to a user's records.
//!
//! The engine never writes. Each accessor maps to one independent query so
//! the fetcher can run them concurrently and degrade them independently.
//!
//! Contract for implementations:
//! - no rows → `Ok(vec![])`, never an error
//! - `ping` fails only when the backend cannot be reached at all

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::record::{
    Action, Connection, Document, Experiment, ExperimentStatus, GeneratedArtifact,
    IdentityProfile, Insight, Topic,
};

/// Row ordering for a category query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recent first (default)
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Common query parameters shared by every list accessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Maximum number of rows
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub order: SortOrder,

    /// Only rows at or after this instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

fn default_limit() -> usize {
    50
}

impl RecordQuery {
    /// Newest-first query with a row limit.
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            order: SortOrder::NewestFirst,
            since: None,
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self::recent(default_limit())
    }
}

/// The core RecordStore trait.
///
/// Implementations: SQLite, in-memory (for testing), none (no-op).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory", "none").
    fn name(&self) -> &str;

    /// Connectivity probe. An error here is the one hard failure of aggregation.
    async fn ping(&self) -> Result<(), StoreError>;

    /// The user's identity profile, if one exists.
    async fn identity(&self, user_id: &str) -> Result<Option<IdentityProfile>, StoreError>;

    async fn insights(&self, user_id: &str, query: &RecordQuery)
    -> Result<Vec<Insight>, StoreError>;

    async fn documents(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Document>, StoreError>;

    /// Experiments whose status is one of `statuses`.
    async fn experiments(
        &self,
        user_id: &str,
        statuses: &[ExperimentStatus],
        query: &RecordQuery,
    ) -> Result<Vec<Experiment>, StoreError>;

    /// Completed actions. `since` filters on the completion time.
    async fn actions(&self, user_id: &str, query: &RecordQuery) -> Result<Vec<Action>, StoreError>;

    async fn topics(&self, user_id: &str, query: &RecordQuery) -> Result<Vec<Topic>, StoreError>;

    async fn connections(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Connection>, StoreError>;

    /// Previously generated artifacts, optionally restricted to one `kind`.
    async fn artifacts(
        &self,
        user_id: &str,
        kind: Option<&str>,
        query: &RecordQuery,
    ) -> Result<Vec<GeneratedArtifact>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_query_defaults() {
        let query = RecordQuery::default();
        assert_eq!(query.limit, 50);
        assert_eq!(query.order, SortOrder::NewestFirst);
        assert!(query.since.is_none());
    }

    #[test]
    fn record_query_deserializes_with_defaults() {
        let query: RecordQuery = serde_json::from_str(r#"{"order":"oldest_first"}"#).unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.order, SortOrder::OldestFirst);
    }

    #[test]
    fn since_builder_sets_window() {
        let now = Utc::now();
        let query = RecordQuery::recent(10).since(now);
        assert_eq!(query.limit, 10);
        assert_eq!(query.since, Some(now));
    }
}
