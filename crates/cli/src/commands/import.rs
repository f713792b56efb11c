//! `contextweave import`: seed the SQLite store from a JSON snapshot.

use std::path::Path;

use contextweave_store::SeedData;
use tracing::info;

use super::{CliResult, load_config, open_sqlite};

pub async fn run(file: &Path, user: &str) -> CliResult {
    let config = load_config()?;
    if config.storage.backend != "sqlite" {
        return Err(format!(
            "import writes to SQLite, but storage.backend is '{}'",
            config.storage.backend
        )
        .into());
    }

    let data = read_seed(file)?;
    let store = open_sqlite(&config.storage).await?;
    let written = store.import(user, &data).await?;

    info!(user, records = written, "Import complete");
    println!(
        "📥 Imported {written} records for '{user}' into {}",
        config.storage.resolved_path().display()
    );
    Ok(())
}

fn read_seed(file: &Path) -> CliResult<SeedData> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let data = SeedData::from_json(&text)
        .map_err(|e| format!("Invalid snapshot {}: {e}", file.display()))?;
    Ok(data)
}
