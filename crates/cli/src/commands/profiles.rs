//! `contextweave profiles`: list weight profiles.

use contextweave_engine::{Category, ProfileRegistry};

use super::{CliResult, load_config, load_registry};

pub fn run() -> CliResult {
    let config = load_config()?;
    let registry = load_registry(&config)?;

    println!("📊 Weight Profiles");
    println!("==================");
    println!();
    print!("{}", render(&registry));
    println!();
    println!("  Unknown consumers use 'default'. Add or override profiles under [profiles.<name>].");
    Ok(())
}

fn render(registry: &ProfileRegistry) -> String {
    let mut out = format!("  {:<20}", "profile");
    for category in Category::ALL {
        out.push_str(&format!(" {:>11}", category.as_str()));
    }
    out.push_str(&format!(" {:>9}  {}\n", "threshold", "ledger kind"));

    for profile in registry.iter() {
        out.push_str(&format!("  {:<20}", profile.name()));
        for (_, weight) in profile.weights() {
            out.push_str(&format!(" {weight:>11.2}"));
        }
        out.push_str(&format!(
            " {:>9.2}  {}\n",
            profile.relevance_threshold(),
            profile.artifact_kind().unwrap_or("(all)")
        ));
    }
    out
}
