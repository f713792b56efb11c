//! Shared test doubles for engine tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use contextweave_core::embedding::EmbeddingService;
use contextweave_core::error::{EmbeddingError, StoreError};
use contextweave_core::record::{
    Action, Connection, Document, Experiment, ExperimentStatus, GeneratedArtifact,
    IdentityProfile, Insight, Topic,
};
use contextweave_core::store::{RecordQuery, RecordStore};
use contextweave_store::{InMemoryStore, SeedData};

/// Fixed reference time so rendered packs are stable across runs.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - chrono::Duration::days(days)
}

pub fn insight(id: &str, title: &str, body: &str, age_days: i64) -> Insight {
    Insight {
        id: id.into(),
        title: title.into(),
        body: body.into(),
        created_at: days_ago(age_days),
        tags: Vec::new(),
        embedding: None,
    }
}

pub fn document(id: &str, title: &str, body: &str, age_days: i64) -> Document {
    Document {
        id: id.into(),
        title: title.into(),
        body: body.into(),
        created_at: days_ago(age_days),
        kind: None,
        embedding: None,
    }
}

pub fn experiment(id: &str, title: &str, status: ExperimentStatus, age_days: i64) -> Experiment {
    Experiment {
        id: id.into(),
        title: title.into(),
        body: String::new(),
        created_at: days_ago(age_days),
        status,
        hypothesis: None,
        embedding: None,
    }
}

pub fn action(id: &str, title: &str, completed_days_ago: i64) -> Action {
    Action {
        id: id.into(),
        title: title.into(),
        body: String::new(),
        created_at: days_ago(completed_days_ago + 1),
        completed_at: Some(days_ago(completed_days_ago)),
    }
}

pub fn artifact(id: &str, kind: &str, title: &str, age_days: i64) -> GeneratedArtifact {
    GeneratedArtifact {
        id: id.into(),
        kind: kind.into(),
        title: title.into(),
        created_at: days_ago(age_days),
    }
}

/// A small but complete user: every category has at least one record.
pub fn sample_seed() -> SeedData {
    SeedData {
        identity: Some(IdentityProfile {
            statement: Some("I am building a fitness brand".into()),
            values: vec!["discipline".into(), "honesty".into()],
            current_focus: Some("Launch the first training program".into()),
            phase: Some("launch".into()),
        }),
        insights: vec![
            insight("i1", "Mornings work", "Training before 7am keeps the day clear", 2),
            insight("i2", "Content beats ads", "Organic posts convert better than paid reach", 5),
            insight("i3", "Short note", "too short", 1),
        ],
        documents: vec![document(
            "d1",
            "Brand strategy draft",
            "Positioning: approachable strength training for busy parents who lift at home",
            7,
        )],
        experiments: vec![
            experiment("e1", "Post every day", ExperimentStatus::InProgress, 3),
            experiment("e2", "Weekly newsletter", ExperimentStatus::Planning, 1),
            experiment("e3", "Cold outreach", ExperimentStatus::Abandoned, 40),
        ],
        actions: vec![action("a1", "Filmed a workout video", 1)],
        topics: vec![Topic {
            id: "t1".into(),
            title: "Strength training".into(),
            body: String::new(),
            created_at: days_ago(20),
        }],
        connections: vec![Connection {
            id: "c1".into(),
            title: "Sam".into(),
            body: "Runs a gym downtown".into(),
            created_at: days_ago(30),
            relationship: Some("mentor".into()),
        }],
        artifacts: vec![artifact("g1", "daily_suggestion", "Record a form-check reel", 2)],
    }
}

/// An in-memory store that can fail, stall or vanish on demand.
pub struct ScriptedStore {
    inner: InMemoryStore,
    failing: HashSet<&'static str>,
    slow: HashSet<&'static str>,
    delay: Duration,
    unreachable: bool,
}

impl ScriptedStore {
    pub async fn seeded(user_id: &str, data: SeedData) -> Self {
        let inner = InMemoryStore::new();
        inner.seed(user_id, data).await;
        Self {
            inner,
            failing: HashSet::new(),
            slow: HashSet::new(),
            delay: Duration::ZERO,
            unreachable: false,
        }
    }

    /// Make these categories return a query error.
    pub fn failing(mut self, categories: &[&'static str]) -> Self {
        self.failing.extend(categories.iter().copied());
        self
    }

    /// Make these categories sleep for `delay` before answering.
    pub fn slow(mut self, categories: &[&'static str], delay: Duration) -> Self {
        self.slow.extend(categories.iter().copied());
        self.delay = delay;
        self
    }

    /// Make every call, including `ping`, fail with a connection error.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    async fn check(&self, category: &'static str) -> Result<(), StoreError> {
        if self.unreachable {
            return Err(StoreError::Connection("connection refused".into()));
        }
        if self.slow.contains(category) {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(category) {
            return Err(StoreError::Query {
                category: category.into(),
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.unreachable {
            return Err(StoreError::Connection("connection refused".into()));
        }
        Ok(())
    }

    async fn identity(&self, user_id: &str) -> Result<Option<IdentityProfile>, StoreError> {
        self.check("identity").await?;
        self.inner.identity(user_id).await
    }

    async fn insights(&self, user_id: &str, q: &RecordQuery) -> Result<Vec<Insight>, StoreError> {
        self.check("insights").await?;
        self.inner.insights(user_id, q).await
    }

    async fn documents(
        &self,
        user_id: &str,
        q: &RecordQuery,
    ) -> Result<Vec<Document>, StoreError> {
        self.check("documents").await?;
        self.inner.documents(user_id, q).await
    }

    async fn experiments(
        &self,
        user_id: &str,
        statuses: &[ExperimentStatus],
        q: &RecordQuery,
    ) -> Result<Vec<Experiment>, StoreError> {
        self.check("experiments").await?;
        self.inner.experiments(user_id, statuses, q).await
    }

    async fn actions(&self, user_id: &str, q: &RecordQuery) -> Result<Vec<Action>, StoreError> {
        self.check("actions").await?;
        self.inner.actions(user_id, q).await
    }

    async fn topics(&self, user_id: &str, q: &RecordQuery) -> Result<Vec<Topic>, StoreError> {
        self.check("topics").await?;
        self.inner.topics(user_id, q).await
    }

    async fn connections(
        &self,
        user_id: &str,
        q: &RecordQuery,
    ) -> Result<Vec<Connection>, StoreError> {
        self.check("connections").await?;
        self.inner.connections(user_id, q).await
    }

    async fn artifacts(
        &self,
        user_id: &str,
        kind: Option<&str>,
        q: &RecordQuery,
    ) -> Result<Vec<GeneratedArtifact>, StoreError> {
        self.check("artifacts").await?;
        self.inner.artifacts(user_id, kind, q).await
    }
}

/// An embedder with a fixed answer for every input.
pub struct FixedEmbedder {
    vector: Option<Vec<f32>>,
    keywords: Option<Vec<String>>,
    fail: bool,
    delay: Duration,
    pub embed_calls: AtomicUsize,
}

impl FixedEmbedder {
    /// Never produces a vector; keywords come from the local extractor.
    pub fn silent() -> Self {
        Self {
            vector: None,
            keywords: None,
            fail: false,
            delay: Duration::ZERO,
            embed_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_vector(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            ..Self::silent()
        }
    }

    /// Every call errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::silent()
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = Some(keywords.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Every call sleeps this long first.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for FixedEmbedder {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(EmbeddingError::Network("scripted outage".into()));
        }
        Ok(self.vector.clone())
    }

    async fn extract_keywords(&self, text: &str) -> Result<Vec<String>, EmbeddingError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(EmbeddingError::Network("scripted outage".into()));
        }
        match &self.keywords {
            Some(keywords) => Ok(keywords.clone()),
            None => Ok(contextweave_core::keywords::extract_keywords(
                text,
                contextweave_core::embedding::DEFAULT_KEYWORD_COUNT,
            )),
        }
    }
}
