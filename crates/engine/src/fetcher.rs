//! Multi-source fetcher.
//!
//! Issues one read per category concurrently and waits for all of them.
//! A failed or late source becomes an empty category; only an unreachable
//! store is a hard failure.

use std::future::Future;
use std::sync::Arc;

use contextweave_core::error::{ContextError, StoreError};
use contextweave_core::record::{ExperimentBuckets, ExperimentStatus, RawSnapshot, SourceKind};
use contextweave_core::store::{RecordQuery, RecordStore};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

/// Per-category row limits for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub insights: usize,
    pub documents: usize,
    pub experiments_in_progress: usize,
    pub experiments_planning: usize,
    pub experiments_historical: usize,
    pub actions: usize,
    pub topics: usize,
    pub connections: usize,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            insights: 50,
            documents: 30,
            experiments_in_progress: 10,
            experiments_planning: 10,
            experiments_historical: 20,
            actions: 50,
            topics: 30,
            connections: 20,
        }
    }
}

/// Reads a [`RawSnapshot`] from a [`RecordStore`].
pub struct Fetcher {
    store: Arc<dyn RecordStore>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fetch every category for `user_id`, bounded by `deadline`.
    pub async fn fetch(
        &self,
        user_id: &str,
        plan: &FetchPlan,
        deadline: Instant,
    ) -> Result<RawSnapshot, ContextError> {
        match timeout_at(deadline, self.store.ping()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ContextError::StorageUnavailable(e)),
            Err(_) => {
                return Err(ContextError::StorageUnavailable(StoreError::Connection(
                    "connectivity probe timed out".into(),
                )));
            }
        }

        let store = self.store.as_ref();
        let insights_query = RecordQuery::recent(plan.insights);
        let documents_query = RecordQuery::recent(plan.documents);
        let in_progress_query = RecordQuery::recent(plan.experiments_in_progress);
        let planning_query = RecordQuery::recent(plan.experiments_planning);
        let historical_query = RecordQuery::recent(plan.experiments_historical);
        let actions_query = RecordQuery::recent(plan.actions);
        let topics_query = RecordQuery::recent(plan.topics);
        let connections_query = RecordQuery::recent(plan.connections);

        let (
            identity,
            insights,
            documents,
            in_progress,
            planning,
            historical,
            actions,
            topics,
            connections,
        ) = tokio::join!(
            bounded(deadline, user_id, SourceKind::Identity, store.identity(user_id)),
            bounded(
                deadline,
                user_id,
                SourceKind::Insights,
                store.insights(user_id, &insights_query),
            ),
            bounded(
                deadline,
                user_id,
                SourceKind::Documents,
                store.documents(user_id, &documents_query),
            ),
            bounded(
                deadline,
                user_id,
                SourceKind::ExperimentsInProgress,
                store.experiments(user_id, &[ExperimentStatus::InProgress], &in_progress_query),
            ),
            bounded(
                deadline,
                user_id,
                SourceKind::ExperimentsPlanning,
                store.experiments(user_id, &[ExperimentStatus::Planning], &planning_query),
            ),
            bounded(
                deadline,
                user_id,
                SourceKind::ExperimentsHistorical,
                store.experiments(user_id, &ExperimentStatus::HISTORICAL, &historical_query),
            ),
            bounded(
                deadline,
                user_id,
                SourceKind::Actions,
                store.actions(user_id, &actions_query),
            ),
            bounded(
                deadline,
                user_id,
                SourceKind::Topics,
                store.topics(user_id, &topics_query),
            ),
            bounded(
                deadline,
                user_id,
                SourceKind::Connections,
                store.connections(user_id, &connections_query),
            ),
        );

        let mut degraded = Vec::new();
        let snapshot = RawSnapshot {
            identity: settle(SourceKind::Identity, identity, &mut degraded).unwrap_or_default(),
            insights: settle(SourceKind::Insights, insights, &mut degraded),
            documents: settle(SourceKind::Documents, documents, &mut degraded),
            experiments: ExperimentBuckets {
                in_progress: settle(SourceKind::ExperimentsInProgress, in_progress, &mut degraded),
                planning: settle(SourceKind::ExperimentsPlanning, planning, &mut degraded),
                historical: settle(SourceKind::ExperimentsHistorical, historical, &mut degraded),
            },
            actions: settle(SourceKind::Actions, actions, &mut degraded),
            topics: settle(SourceKind::Topics, topics, &mut degraded),
            connections: settle(SourceKind::Connections, connections, &mut degraded),
            degraded,
        };

        debug!(
            user_id,
            insights = snapshot.insights.len(),
            documents = snapshot.documents.len(),
            experiments = snapshot.experiments.len(),
            actions = snapshot.actions.len(),
            topics = snapshot.topics.len(),
            connections = snapshot.connections.len(),
            degraded = snapshot.degraded.len(),
            "Fetch complete"
        );
        Ok(snapshot)
    }
}

/// Await one source read. `None` means the source failed or missed the deadline.
async fn bounded<T>(
    deadline: Instant,
    user_id: &str,
    source: SourceKind,
    read: impl Future<Output = Result<T, StoreError>>,
) -> Option<T> {
    match timeout_at(deadline, read).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(user_id, source = %source, error = %e, "Source unavailable, continuing without it");
            None
        }
        Err(_) => {
            warn!(user_id, source = %source, "Source missed the deadline, continuing without it");
            None
        }
    }
}

fn settle<T: Default>(source: SourceKind, value: Option<T>, degraded: &mut Vec<SourceKind>) -> T {
    value.unwrap_or_else(|| {
        degraded.push(source);
        T::default()
    })
}
