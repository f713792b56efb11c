//! ContextWeave CLI, the main entry point.
//!
//! Commands:
//! - `build`    Build a context pack for a user and consumer
//! - `profiles` List weight profiles
//! - `import`   Seed the SQLite store from a JSON file
//! - `config`   Show configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "contextweave",
    about = "ContextWeave: bounded, weighted context packs from personal records",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a context pack and print it
    Build(commands::build::BuildArgs),

    /// List weight profiles with their normalized weights
    Profiles,

    /// Import a JSON snapshot of one user's records into SQLite
    Import {
        /// Path to the JSON file
        file: std::path::PathBuf,

        /// User the records belong to
        #[arg(short, long)]
        user: String,
    },

    /// Print the default configuration
    Config {
        /// Print the config file path instead
        #[arg(long, conflicts_with = "current")]
        path: bool,

        /// Print the loaded configuration (file plus env overrides)
        #[arg(long)]
        current: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so packs can be piped.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::run(args).await?,
        Commands::Profiles => commands::profiles::run()?,
        Commands::Import { file, user } => commands::import::run(&file, &user).await?,
        Commands::Config { path, current } => {
            if path {
                commands::config_cmd::path()?
            } else if current {
                commands::config_cmd::current()?
            } else {
                commands::config_cmd::show_default()?
            }
        }
    }

    Ok(())
}
