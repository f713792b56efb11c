//! In-memory backend, useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use contextweave_core::error::StoreError;
use contextweave_core::record::{
    Action, Connection, Document, Experiment, ExperimentStatus, GeneratedArtifact,
    IdentityProfile, Insight, Topic,
};
use contextweave_core::store::{RecordQuery, RecordStore};
use tokio::sync::RwLock;

use crate::seed::{SeedData, apply_query};

/// A backend that keeps every user's records in a map.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<String, SeedData>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace everything stored for `user_id`.
    pub async fn seed(&self, user_id: impl Into<String>, data: SeedData) {
        self.users.write().await.insert(user_id.into(), data);
    }

    /// Number of list records stored for `user_id`.
    pub async fn count(&self, user_id: &str) -> usize {
        self.users
            .read()
            .await
            .get(user_id)
            .map_or(0, SeedData::record_count)
    }

    async fn with_user<T: Default>(&self, user_id: &str, f: impl FnOnce(&SeedData) -> T) -> T {
        self.users.read().await.get(user_id).map(f).unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn identity(&self, user_id: &str) -> Result<Option<IdentityProfile>, StoreError> {
        Ok(self.with_user(user_id, |d| d.identity.clone()).await)
    }

    async fn insights(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Insight>, StoreError> {
        Ok(self
            .with_user(user_id, |d| apply_query(&d.insights, query, |r| r.created_at))
            .await)
    }

    async fn documents(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .with_user(user_id, |d| apply_query(&d.documents, query, |r| r.created_at))
            .await)
    }

    async fn experiments(
        &self,
        user_id: &str,
        statuses: &[ExperimentStatus],
        query: &RecordQuery,
    ) -> Result<Vec<Experiment>, StoreError> {
        Ok(self
            .with_user(user_id, |d| {
                let matching: Vec<Experiment> = d
                    .experiments
                    .iter()
                    .filter(|e| statuses.contains(&e.status))
                    .cloned()
                    .collect();
                apply_query(&matching, query, |r| r.created_at)
            })
            .await)
    }

    async fn actions(&self, user_id: &str, query: &RecordQuery) -> Result<Vec<Action>, StoreError> {
        Ok(self
            .with_user(user_id, |d| apply_query(&d.actions, query, Action::performed_at))
            .await)
    }

    async fn topics(&self, user_id: &str, query: &RecordQuery) -> Result<Vec<Topic>, StoreError> {
        Ok(self
            .with_user(user_id, |d| apply_query(&d.topics, query, |r| r.created_at))
            .await)
    }

    async fn connections(
        &self,
        user_id: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Connection>, StoreError> {
        Ok(self
            .with_user(user_id, |d| apply_query(&d.connections, query, |r| r.created_at))
            .await)
    }

    async fn artifacts(
        &self,
        user_id: &str,
        kind: Option<&str>,
        query: &RecordQuery,
    ) -> Result<Vec<GeneratedArtifact>, StoreError> {
        Ok(self
            .with_user(user_id, |d| {
                let matching: Vec<GeneratedArtifact> = d
                    .artifacts
                    .iter()
                    .filter(|a| kind.is_none_or(|k| a.kind == k))
                    .cloned()
                    .collect();
                apply_query(&matching, query, |r| r.created_at)
            })
            .await)
    }
}
