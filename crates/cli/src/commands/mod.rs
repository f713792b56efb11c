pub mod build;
pub mod config_cmd;
pub mod import;
pub mod profiles;

use std::sync::Arc;

use contextweave_config::{AppConfig, StorageConfig};
use contextweave_core::store::RecordStore;
use contextweave_engine::ProfileRegistry;
use contextweave_store::{InMemoryStore, NoopStore, SqliteStore};
use tracing::info;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config() -> CliResult<AppConfig> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Built-in profiles with the configured overrides applied.
pub fn load_registry(config: &AppConfig) -> CliResult<ProfileRegistry> {
    Ok(ProfileRegistry::with_overrides(&config.profiles)?)
}

/// Open the configured record store.
pub async fn open_store(storage: &StorageConfig) -> CliResult<Arc<dyn RecordStore>> {
    match storage.backend.as_str() {
        "sqlite" => Ok(Arc::new(open_sqlite(storage).await?)),
        "memory" => {
            info!("Using an empty in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        _ => Ok(Arc::new(NoopStore)),
    }
}

pub async fn open_sqlite(storage: &StorageConfig) -> CliResult<SqliteStore> {
    let path = storage.resolved_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteStore::new(&path.to_string_lossy()).await?)
}
