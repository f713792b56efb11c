//! Configuration loading, validation, and management for ContextWeave.
//!
//! Loads configuration from `~/.contextweave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Category names a profile may weight.
pub const KNOWN_CATEGORIES: &[&str] = &[
    "identity",
    "insights",
    "documents",
    "experiments",
    "actions",
    "topics",
    "connections",
];

/// The root configuration structure.
///
/// Maps directly to `~/.contextweave/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding / keyword service
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Aggregation limits and budgets
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Extra or overriding weight profiles, keyed by consumer name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite", "memory" or "none"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Database file (SQLite only). Defaults to `~/.contextweave/records.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

impl StorageConfig {
    /// The database path, falling back to the config directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| AppConfig::config_dir().join("records.sqlite"))
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "none" or "openai" (any OpenAI-compatible `/embeddings` endpoint)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "none".into()
}
fn default_embedding_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_timeout() -> u64 {
    10
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_url: default_embedding_url(),
            api_key: None,
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Token budget for the whole pack
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_max_items")]
    pub max_items_per_category: usize,

    /// Per-item character cap applied before budget fitting
    #[serde(default = "default_item_char_cap")]
    pub item_char_cap: usize,

    /// Cap on exclusion-ledger entries emitted
    #[serde(default = "default_max_excluded")]
    pub max_excluded: usize,

    #[serde(default = "default_ledger_window")]
    pub ledger_window_days: u32,

    /// Cap applied to the identity statement before it reaches the resolver
    #[serde(default = "default_query_char_cap")]
    pub query_char_cap: usize,

    #[serde(default = "default_top_k")]
    pub relevance_top_k: usize,

    /// Overall deadline for one aggregation (0 = none)
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    #[serde(default)]
    pub min_body_chars: MinBodyConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_max_tokens() -> usize {
    5000
}
fn default_max_items() -> usize {
    8
}
fn default_item_char_cap() -> usize {
    280
}
fn default_max_excluded() -> usize {
    40
}
fn default_ledger_window() -> u32 {
    45
}
fn default_query_char_cap() -> usize {
    1000
}
fn default_top_k() -> usize {
    20
}
fn default_deadline_ms() -> u64 {
    8000
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_items_per_category: default_max_items(),
            item_char_cap: default_item_char_cap(),
            max_excluded: default_max_excluded(),
            ledger_window_days: default_ledger_window(),
            query_char_cap: default_query_char_cap(),
            relevance_top_k: default_top_k(),
            deadline_ms: default_deadline_ms(),
            min_body_chars: MinBodyConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Minimum body length per category; shorter items are dropped as low-signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinBodyConfig {
    #[serde(default = "default_min_insight")]
    pub insights: usize,
    #[serde(default = "default_min_document")]
    pub documents: usize,
    #[serde(default)]
    pub experiments: usize,
    #[serde(default)]
    pub actions: usize,
    #[serde(default)]
    pub topics: usize,
    #[serde(default)]
    pub connections: usize,
}

fn default_min_insight() -> usize {
    20
}
fn default_min_document() -> usize {
    40
}

impl Default for MinBodyConfig {
    fn default() -> Self {
        Self {
            insights: default_min_insight(),
            documents: default_min_document(),
            experiments: 0,
            actions: 0,
            topics: 0,
            connections: 0,
        }
    }
}

/// Per-category row limits for the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_insights_limit")]
    pub insights: usize,
    #[serde(default = "default_documents_limit")]
    pub documents: usize,
    /// Insight pool size when relevance search is on
    #[serde(default = "default_insight_pool")]
    pub insight_pool: usize,
    #[serde(default = "default_document_pool")]
    pub document_pool: usize,
    #[serde(default = "default_active_experiments")]
    pub experiments_in_progress: usize,
    #[serde(default = "default_active_experiments")]
    pub experiments_planning: usize,
    #[serde(default = "default_historical_experiments")]
    pub experiments_historical: usize,
    #[serde(default = "default_insights_limit")]
    pub actions: usize,
    #[serde(default = "default_documents_limit")]
    pub topics: usize,
    #[serde(default = "default_connections_limit")]
    pub connections: usize,
}

fn default_insights_limit() -> usize {
    50
}
fn default_documents_limit() -> usize {
    30
}
fn default_insight_pool() -> usize {
    500
}
fn default_document_pool() -> usize {
    200
}
fn default_active_experiments() -> usize {
    10
}
fn default_historical_experiments() -> usize {
    20
}
fn default_connections_limit() -> usize {
    20
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            insights: default_insights_limit(),
            documents: default_documents_limit(),
            insight_pool: default_insight_pool(),
            document_pool: default_document_pool(),
            experiments_in_progress: default_active_experiments(),
            experiments_planning: default_active_experiments(),
            experiments_historical: default_historical_experiments(),
            actions: default_insights_limit(),
            topics: default_documents_limit(),
            connections: default_connections_limit(),
        }
    }
}

/// A weight profile declared in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Category name → weight. Normalized to sum to 1.0 on load.
    pub weights: BTreeMap<String, f32>,

    /// Cosine cutoff for the vector relevance tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_threshold: Option<f32>,

    /// Artifact kind whose recent titles feed the exclusion ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_kind: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.contextweave/config.toml).
    ///
    /// Environment overrides:
    /// - `CONTEXTWEAVE_API_KEY`, then `OPENAI_API_KEY` (embedding key)
    /// - `CONTEXTWEAVE_DB` (SQLite path)
    /// - `CONTEXTWEAVE_EMBEDDING_PROVIDER`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.embedding.api_key.is_none() {
            config.embedding.api_key = std::env::var("CONTEXTWEAVE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(path) = std::env::var("CONTEXTWEAVE_DB") {
            config.storage.path = Some(path);
        }

        if let Ok(provider) = std::env::var("CONTEXTWEAVE_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".contextweave")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let agg = &self.aggregation;
        if agg.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "aggregation.max_tokens must be > 0".into(),
            ));
        }
        if agg.item_char_cap == 0 {
            return Err(ConfigError::ValidationError(
                "aggregation.item_char_cap must be > 0".into(),
            ));
        }
        if agg.query_char_cap == 0 {
            return Err(ConfigError::ValidationError(
                "aggregation.query_char_cap must be > 0".into(),
            ));
        }

        if !matches!(self.storage.backend.as_str(), "sqlite" | "memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "unknown storage backend '{}'",
                self.storage.backend
            )));
        }

        for (name, profile) in &self.profiles {
            for (category, weight) in &profile.weights {
                if !KNOWN_CATEGORIES.contains(&category.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "profile '{name}': unknown category '{category}'"
                    )));
                }
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(ConfigError::ValidationError(format!(
                        "profile '{name}': weight for '{category}' must be a non-negative number"
                    )));
                }
            }
            if profile.weights.values().all(|w| *w <= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "profile '{name}': at least one weight must be > 0"
                )));
            }
            if let Some(t) = profile.relevance_threshold
                && !(-1.0..=1.0).contains(&t)
            {
                return Err(ConfigError::ValidationError(format!(
                    "profile '{name}': relevance_threshold must be within [-1, 1]"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            aggregation: AggregationConfig::default(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
