// src/main.rs
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use product_matching_lib::{
    comparison::run_comparison,
    matching::manager::ProductMatcher,
    models::listing::{Listing, ListingSource},
    utils::{env::load_env, progress_config::ProgressConfig, rules_config::MatchingConfig},
};

/// Groups listings scraped from several shops and reports the cheapest offer per product.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listing source as PLATFORM=PATH, where PATH is a JSON array of listings. Repeatable.
    #[arg(long = "source", value_name = "PLATFORM=PATH", required = true, value_parser = parse_source_arg)]
    sources: Vec<(String, PathBuf)>,

    /// Matching rules file (defaults to $MATCHING_RULES_PATH, then config/rules.yaml)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Where to write the JSON report; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_source_arg(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((platform, path)) if !platform.trim().is_empty() && !path.is_empty() => {
            Ok((platform.trim().to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected PLATFORM=PATH, got '{}'", value)),
    }
}

fn load_source(platform: &str, path: &Path) -> Result<ListingSource> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read listings for {} from {}", platform, path.display()))?;
    let listings: Vec<Listing> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse listings in {}", path.display()))?;
    info!("Loaded {} listings for {} from {}", listings.len(), platform, path.display());
    Ok(ListingSource::new(platform, listings))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    load_env();
    let args = Args::parse();
    let start = Instant::now();
    info!("Starting cross-source product comparison");

    let config = MatchingConfig::load(args.rules.as_deref()).context("Failed to load matching rules")?;
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();

    let main_pb = if let Some(mp) = &multi_progress {
        let pb = mp.add(ProgressBar::new(3));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .context("Failed to set progress bar style")?
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Loading listings...");
        Some(pb)
    } else {
        None
    };

    let sources = args
        .sources
        .iter()
        .map(|(platform, path)| load_source(platform, path))
        .collect::<Result<Vec<_>>>()?;
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Matching listings...");
    }

    let matcher = ProductMatcher::with_http_fetcher(Arc::new(config))?;
    let report = run_comparison(&matcher, &sources, multi_progress.as_ref()).await?;
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.set_message("Writing report...");
    }

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize comparison report")?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    if let Some(pb) = main_pb {
        pb.inc(1);
        pb.finish_with_message("Comparison complete");
    }
    info!(
        "✅ Compared {} sources into {} groups ({:.1}% cross-platform) in {:.2?}",
        sources.len(),
        report.stats.total_groups,
        report.stats.cross_platform_percentage,
        start.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_arg() {
        assert_eq!(
            parse_source_arg("suning=data/suning.json").unwrap(),
            ("suning".to_string(), PathBuf::from("data/suning.json"))
        );
        assert!(parse_source_arg("suning").is_err());
        assert!(parse_source_arg("=data.json").is_err());
        assert!(parse_source_arg("pdd=").is_err());
    }
}
