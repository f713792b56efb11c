//! Weight profiles: how much of the budget each category gets per consumer.
//!
//! The registry is built once per process, normalized on construction and
//! shared read-only behind an `Arc`. Unknown consumer names resolve to the
//! `default` profile.

use std::collections::BTreeMap;

use contextweave_config::ProfileConfig;
use contextweave_core::error::ContextError;
use serde::{Deserialize, Serialize};

/// Name of the fallback profile.
pub const DEFAULT_PROFILE: &str = "default";

/// Vector cutoff used when a configured profile does not name one.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.40;

/// A weighted content category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Identity,
    Insights,
    Documents,
    Experiments,
    Actions,
    Topics,
    Connections,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::Identity,
        Self::Insights,
        Self::Documents,
        Self::Experiments,
        Self::Actions,
        Self::Topics,
        Self::Connections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Insights => "insights",
            Self::Documents => "documents",
            Self::Experiments => "experiments",
            Self::Actions => "actions",
            Self::Topics => "topics",
            Self::Connections => "connections",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, normalized category weighting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightProfile {
    name: String,
    weights: [f32; 7],
    relevance_threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_kind: Option<String>,
}

impl WeightProfile {
    /// Build a profile. Weights are normalized to sum to 1.0; negative or
    /// non-finite weights count as zero, and an all-zero profile becomes uniform.
    pub fn new(
        name: impl Into<String>,
        weights: impl IntoIterator<Item = (Category, f32)>,
        relevance_threshold: f32,
    ) -> Self {
        let mut table = [0.0f32; 7];
        for (category, weight) in weights {
            table[category.index()] = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        }

        let sum: f32 = table.iter().sum();
        if sum > 0.0 {
            for w in &mut table {
                *w /= sum;
            }
        } else {
            table = [1.0 / table.len() as f32; 7];
        }

        Self {
            name: name.into(),
            weights: table,
            relevance_threshold,
            artifact_kind: None,
        }
    }

    /// Restrict the dedup ledger to artifacts of this kind.
    pub fn with_artifact_kind(mut self, kind: impl Into<String>) -> Self {
        self.artifact_kind = Some(kind.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self, category: Category) -> f32 {
        self.weights[category.index()]
    }

    /// `(category, weight)` pairs in canonical category order.
    pub fn weights(&self) -> impl Iterator<Item = (Category, f32)> + '_ {
        Category::ALL.into_iter().map(|c| (c, self.weight(c)))
    }

    pub fn total_weight(&self) -> f32 {
        self.weights.iter().sum()
    }

    pub fn relevance_threshold(&self) -> f32 {
        self.relevance_threshold
    }

    /// Artifact kind for the dedup ledger; `None` means every kind.
    pub fn artifact_kind(&self) -> Option<&str> {
        self.artifact_kind.as_deref()
    }
}

fn builtin(name: &str, w: [f32; 7], threshold: f32) -> WeightProfile {
    WeightProfile::new(name, Category::ALL.into_iter().zip(w), threshold)
}

/// The immutable set of named weight profiles.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, WeightProfile>,
    fallback: WeightProfile,
}

impl ProfileRegistry {
    /// The built-in profile table.
    pub fn builtin() -> Self {
        //                                 ident  ins   docs  exps  acts  tops  conns
        let table = [
            builtin(DEFAULT_PROFILE, [0.20, 0.25, 0.20, 0.15, 0.10, 0.05, 0.05], 0.40),
            builtin("identity_grounding", [0.55, 0.15, 0.05, 0.10, 0.10, 0.05, 0.0], 0.45),
            builtin("document_synthesis", [0.10, 0.30, 0.40, 0.10, 0.05, 0.05, 0.0], 0.35)
                .with_artifact_kind("document_synthesis"),
            builtin("daily_suggestion", [0.25, 0.20, 0.10, 0.25, 0.15, 0.05, 0.0], 0.40)
                .with_artifact_kind("daily_suggestion"),
            builtin("experiment_design", [0.20, 0.25, 0.10, 0.35, 0.10, 0.0, 0.0], 0.40)
                .with_artifact_kind("experiment_design"),
            builtin("weekly_reflection", [0.20, 0.30, 0.05, 0.15, 0.25, 0.05, 0.0], 0.30)
                .with_artifact_kind("weekly_reflection"),
        ];

        let fallback = table[0].clone();
        let profiles = table
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { profiles, fallback }
    }

    /// The built-in table extended or overridden by configured profiles.
    ///
    /// An override replaces the weight map wholesale; categories it does not
    /// mention get zero. Threshold and artifact kind fall back to the
    /// overridden built-in, then to the defaults.
    pub fn with_overrides(
        overrides: &BTreeMap<String, ProfileConfig>,
    ) -> Result<Self, ContextError> {
        let mut registry = Self::builtin();

        for (name, config) in overrides {
            let mut weights = Vec::with_capacity(config.weights.len());
            for (category, weight) in &config.weights {
                let category = Category::parse(category).ok_or_else(|| ContextError::Config {
                    message: format!("profile '{name}': unknown category '{category}'"),
                })?;
                weights.push((category, *weight));
            }

            let base = registry.profiles.get(name);
            let threshold = config
                .relevance_threshold
                .or_else(|| base.map(WeightProfile::relevance_threshold))
                .unwrap_or(DEFAULT_RELEVANCE_THRESHOLD);
            let kind = config
                .artifact_kind
                .clone()
                .or_else(|| base.and_then(|b| b.artifact_kind.clone()));

            let mut profile = WeightProfile::new(name.as_str(), weights, threshold);
            profile.artifact_kind = kind;

            if name == DEFAULT_PROFILE {
                registry.fallback = profile.clone();
            }
            registry.profiles.insert(name.clone(), profile);
        }

        Ok(registry)
    }

    /// The profile for `consumer`, or `default` when the name is unknown.
    pub fn resolve(&self, consumer: &str) -> &WeightProfile {
        self.profiles.get(consumer).unwrap_or(&self.fallback)
    }

    pub fn get(&self, name: &str) -> Option<&WeightProfile> {
        self.profiles.get(name)
    }

    /// All profiles, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &WeightProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
