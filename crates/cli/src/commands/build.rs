//! `contextweave build`: build a context pack and print it.

use std::sync::Arc;

use contextweave_engine::{BuildOptions, ContextEngine, EngineSettings};
use tracing::warn;

use super::{CliResult, load_config, load_registry, open_store};

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// User to build the pack for
    #[arg(short, long)]
    pub user: String,

    /// Consumer name; selects the weight profile
    #[arg(short, long, default_value = "default")]
    pub consumer: String,

    /// Token budget (defaults to aggregation.max_tokens)
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Item cap per category (defaults to aggregation.max_items_per_category)
    #[arg(long)]
    pub max_items: Option<usize>,

    /// Rank insights and documents against the identity statement
    #[arg(long)]
    pub relevance: bool,

    /// Print the pack with metadata as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: BuildArgs) -> CliResult {
    let config = load_config()?;
    let registry = Arc::new(load_registry(&config)?);
    let store = open_store(&config.storage).await?;
    let embedder = contextweave_providers::build_from_config(&config.embedding);

    let options = request_options(&args, BuildOptions::from_config(&config.aggregation))?;
    let engine = ContextEngine::new(
        store,
        embedder,
        registry,
        EngineSettings::from_config(&config.aggregation),
    );

    let pack = engine
        .build_context(&args.user, &args.consumer, options)
        .await?;

    if !pack.metadata.degraded.is_empty() {
        let degraded: Vec<&str> = pack.metadata.degraded.iter().map(|s| s.as_str()).collect();
        warn!("Pack built without: {}", degraded.join(", "));
    }

    if args.json {
        println!("{}", pack.to_json()?);
    } else {
        print!("{}", pack.to_text());
    }
    Ok(())
}

fn request_options(args: &BuildArgs, defaults: BuildOptions) -> CliResult<BuildOptions> {
    let mut options = defaults.with_relevance(args.relevance);
    if let Some(max_tokens) = args.max_tokens {
        if max_tokens == 0 {
            return Err("--max-tokens must be greater than 0".into());
        }
        options.max_tokens = max_tokens;
    }
    if let Some(max_items) = args.max_items {
        options.max_items_per_category = max_items;
    }
    Ok(options)
}
