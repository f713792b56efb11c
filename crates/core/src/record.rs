//! Typed personal records and the raw per-request snapshot.
//!
//! Every list-shaped category implements [`Record`], which is the only view
//! the compactor, relevance resolver and formatter ever need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common read-only view over a list-shaped record.
pub trait Record {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    /// Free-text body. Empty when the record has none.
    fn body(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    /// Precomputed semantic vector, if the store carries one.
    fn embedding(&self) -> Option<&[f32]> {
        None
    }
}

/// The user's identity statement and its companions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityProfile {
    /// Free-text "who I am becoming" statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_focus: Option<String>,

    /// Life phase label, e.g. "rebuilding" or "launch".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl IdentityProfile {
    /// The statement, trimmed, if it has any content.
    pub fn statement_text(&self) -> Option<&str> {
        non_blank(self.statement.as_deref())
    }

    pub fn focus_text(&self) -> Option<&str> {
        non_blank(self.current_focus.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.statement_text().is_none()
            && self.focus_text().is_none()
            && non_blank(self.phase.as_deref()).is_none()
            && self.values.iter().all(|v| v.trim().is_empty())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A captured note or realization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// An imported document (article, journal export, transcript summary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Lifecycle state of a behavioral experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    InProgress,
    Planning,
    Completed,
    Abandoned,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Planning => "planning",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "planning" => Some(Self::Planning),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Finished experiments, reported in the "past" bucket.
    pub fn is_historical(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    pub const HISTORICAL: [ExperimentStatus; 2] = [Self::Completed, Self::Abandoned];
}

/// A running, planned or finished behavioral experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub status: ExperimentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypothesis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A completed action, optionally with a free-text reflection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub title: String,
    /// Reflection written after completing the action.
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Action {
    /// When the action was performed; falls back to creation time.
    pub fn performed_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }
}

/// A topical tag the user follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A person in the user's network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    /// The person's name.
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

/// Something a consumer generated earlier (a suggestion, a prompt, a plan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub id: String,
    /// Which consumer produced it, e.g. "daily_suggestion".
    pub kind: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

macro_rules! impl_record {
    ($ty:ty, embedding) => {
        impl Record for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn title(&self) -> &str {
                &self.title
            }
            fn body(&self) -> &str {
                &self.body
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
            fn embedding(&self) -> Option<&[f32]> {
                self.embedding.as_deref()
            }
        }
    };
    ($ty:ty) => {
        impl Record for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn title(&self) -> &str {
                &self.title
            }
            fn body(&self) -> &str {
                &self.body
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        }
    };
}

impl_record!(Insight, embedding);
impl_record!(Document, embedding);
impl_record!(Experiment, embedding);
impl_record!(Action);
impl_record!(Topic);
impl_record!(Connection);

impl Record for GeneratedArtifact {
    fn id(&self) -> &str {
        &self.id
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn body(&self) -> &str {
        ""
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Experiments split by lifecycle bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentBuckets {
    #[serde(default)]
    pub in_progress: Vec<Experiment>,
    #[serde(default)]
    pub planning: Vec<Experiment>,
    #[serde(default)]
    pub historical: Vec<Experiment>,
}

impl ExperimentBuckets {
    /// Route experiments into buckets by status.
    pub fn partition(experiments: impl IntoIterator<Item = Experiment>) -> Self {
        let mut buckets = Self::default();
        for exp in experiments {
            match exp.status {
                ExperimentStatus::InProgress => buckets.in_progress.push(exp),
                ExperimentStatus::Planning => buckets.planning.push(exp),
                ExperimentStatus::Completed | ExperimentStatus::Abandoned => {
                    buckets.historical.push(exp)
                }
            }
        }
        buckets
    }

    pub fn len(&self) -> usize {
        self.in_progress.len() + self.planning.len() + self.historical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Categories whose reads can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Identity,
    Insights,
    Documents,
    ExperimentsInProgress,
    ExperimentsPlanning,
    ExperimentsHistorical,
    Actions,
    Topics,
    Connections,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Insights => "insights",
            Self::Documents => "documents",
            Self::ExperimentsInProgress => "experiments.in_progress",
            Self::ExperimentsPlanning => "experiments.planning",
            Self::ExperimentsHistorical => "experiments.historical",
            Self::Actions => "actions",
            Self::Topics => "topics",
            Self::Connections => "connections",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unprocessed per-category results for one aggregation request.
///
/// Every list is always present; a source that failed or timed out is
/// empty and listed in `degraded`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub identity: IdentityProfile,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub experiments: ExperimentBuckets,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Sources that failed or missed the deadline during this fetch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<SourceKind>,
}

impl RawSnapshot {
    /// True when no category produced anything.
    pub fn is_empty(&self) -> bool {
        self.identity.is_empty()
            && self.insights.is_empty()
            && self.documents.is_empty()
            && self.experiments.is_empty()
            && self.actions.is_empty()
            && self.topics.is_empty()
            && self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiment(id: &str, status: ExperimentStatus) -> Experiment {
        Experiment {
            id: id.into(),
            title: format!("Experiment {id}"),
            body: "Try waking at 6am for two weeks".into(),
            created_at: Utc::now(),
            status,
            hypothesis: None,
            embedding: None,
        }
    }

    #[test]
    fn blank_identity_is_empty() {
        let identity = IdentityProfile {
            statement: Some("   ".into()),
            values: vec!["".into()],
            current_focus: None,
            phase: Some("\n".into()),
        };
        assert!(identity.is_empty());
        assert!(identity.statement_text().is_none());
    }

    #[test]
    fn statement_text_is_trimmed() {
        let identity = IdentityProfile {
            statement: Some("  building a fitness brand \n".into()),
            ..Default::default()
        };
        assert_eq!(identity.statement_text(), Some("building a fitness brand"));
        assert!(!identity.is_empty());
    }

    #[test]
    fn experiments_partition_by_status() {
        let buckets = ExperimentBuckets::partition(vec![
            experiment("a", ExperimentStatus::InProgress),
            experiment("b", ExperimentStatus::Planning),
            experiment("c", ExperimentStatus::Completed),
            experiment("d", ExperimentStatus::Abandoned),
            experiment("e", ExperimentStatus::InProgress),
        ]);
        assert_eq!(buckets.in_progress.len(), 2);
        assert_eq!(buckets.planning.len(), 1);
        assert_eq!(buckets.historical.len(), 2);
        assert_eq!(buckets.len(), 5);
    }

    #[test]
    fn experiment_status_roundtrip_strings() {
        for status in [
            ExperimentStatus::InProgress,
            ExperimentStatus::Planning,
            ExperimentStatus::Completed,
            ExperimentStatus::Abandoned,
        ] {
            assert_eq!(ExperimentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ExperimentStatus::parse("paused"), None);
    }

    #[test]
    fn action_performed_at_falls_back_to_created() {
        let created = Utc::now();
        let action = Action {
            id: "a1".into(),
            title: "Applied to 5 jobs".into(),
            body: String::new(),
            created_at: created,
            completed_at: None,
        };
        assert_eq!(action.performed_at(), created);
    }

    #[test]
    fn default_snapshot_is_empty() {
        let snapshot = RawSnapshot::default();
        assert!(snapshot.is_empty());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("degraded"));
    }

    #[test]
    fn record_trait_exposes_embedding() {
        let insight = Insight {
            id: "i1".into(),
            title: "Morning pages".into(),
            body: "Writing first thing clears my head".into(),
            created_at: Utc::now(),
            tags: vec![],
            embedding: Some(vec![0.1, 0.2]),
        };
        assert_eq!(insight.embedding(), Some(&[0.1f32, 0.2][..]));
        let topic = Topic {
            id: "t1".into(),
            title: "fitness".into(),
            body: String::new(),
            created_at: Utc::now(),
        };
        assert!(topic.embedding().is_none());
    }
}
