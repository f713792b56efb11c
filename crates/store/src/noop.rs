//! No-op backend: every category is empty.

use async_trait::async_trait;
use contextweave_core::error::StoreError;
use contextweave_core::record::{
    Action, Connection, Document, Experiment, ExperimentStatus, GeneratedArtifact,
    IdentityProfile, Insight, Topic,
};
use contextweave_core::store::{RecordQuery, RecordStore};

/// A backend that stores nothing. Aggregation against it yields an empty pack.
pub struct NoopStore;

#[async_trait]
impl RecordStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn identity(&self, _user_id: &str) -> Result<Option<IdentityProfile>, StoreError> {
        Ok(None)
    }

    async fn insights(&self, _: &str, _: &RecordQuery) -> Result<Vec<Insight>, StoreError> {
        Ok(Vec::new())
    }

    async fn documents(&self, _: &str, _: &RecordQuery) -> Result<Vec<Document>, StoreError> {
        Ok(Vec::new())
    }

    async fn experiments(
        &self,
        _: &str,
        _: &[ExperimentStatus],
        _: &RecordQuery,
    ) -> Result<Vec<Experiment>, StoreError> {
        Ok(Vec::new())
    }

    async fn actions(&self, _: &str, _: &RecordQuery) -> Result<Vec<Action>, StoreError> {
        Ok(Vec::new())
    }

    async fn topics(&self, _: &str, _: &RecordQuery) -> Result<Vec<Topic>, StoreError> {
        Ok(Vec::new())
    }

    async fn connections(&self, _: &str, _: &RecordQuery) -> Result<Vec<Connection>, StoreError> {
        Ok(Vec::new())
    }

    async fn artifacts(
        &self,
        _: &str,
        _: Option<&str>,
        _: &RecordQuery,
    ) -> Result<Vec<GeneratedArtifact>, StoreError> {
        Ok(Vec::new())
    }
}
