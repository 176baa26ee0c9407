// src/bin/compare_pair.rs
// Scores two listings and prints the match verdict with its breakdown.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use product_matching_lib::matching::manager::ProductMatcher;
use product_matching_lib::models::listing::Listing;
use product_matching_lib::utils::env::load_env;
use product_matching_lib::utils::rules_config::MatchingConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct CompareArgs {
    /// JSON file holding an array of exactly two listings
    pair: PathBuf,

    /// Matching rules file (defaults to $MATCHING_RULES_PATH, then config/rules.yaml)
    #[arg(long)]
    rules: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    load_env();
    let args = CompareArgs::parse();

    let config = MatchingConfig::load(args.rules.as_deref()).context("Failed to load matching rules")?;
    config.log_config();

    let text = std::fs::read_to_string(&args.pair)
        .with_context(|| format!("Failed to read {}", args.pair.display()))?;
    let listings: Vec<Listing> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse listings in {}", args.pair.display()))?;
    let [first, second] = <[Listing; 2]>::try_from(listings)
        .map_err(|l| anyhow::anyhow!("expected exactly 2 listings, found {}", l.len()))?;
    let (first, second) = (first.with_description_fallback(), second.with_description_fallback());

    let matcher = ProductMatcher::with_http_fetcher(Arc::new(config))?;
    let result = matcher.is_same_product(&first, &second).await?;
    info!(
        "'{}' ({}) vs '{}' ({}): similarity {:.3}, same={}",
        first.title, first.platform, second.title, second.platform, result.similarity, result.is_same
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize match result")?
    );
    matcher.image_service().cache().lock().await.log_stats();
    Ok(())
}
