// src/comparison.rs
use anyhow::{Context, Result};
use indicatif::MultiProgress;
use log::info;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::clustering::group_products::group_products_by_similarity;
use crate::clustering::representatives::{select_representatives, ComparisonReport};
use crate::matching::features::normalize_image_urls;
use crate::matching::manager::ProductMatcher;
use crate::models::listing::ListingSource;

const BASE_PASS_TIMEOUT: Duration = Duration::from_secs(30);

/// Wall-clock budget for one pass: the configured value, or a base allowance
/// plus one fetch timeout per distinct image URL.
pub fn pass_budget(matcher: &ProductMatcher, sources: &[ListingSource]) -> Duration {
    if let Some(fixed) = matcher.config().pass_timeout {
        return fixed;
    }
    let distinct_urls: HashSet<String> = sources
        .iter()
        .flat_map(|s| s.listings.iter())
        .flat_map(|l| normalize_image_urls(&l.images))
        .collect();
    let per_fetch = matcher.config().image_rules.fetch_timeout;
    BASE_PASS_TIMEOUT + per_fetch.saturating_mul(distinct_urls.len().try_into().unwrap_or(u32::MAX))
}

/// Groups every listing from `sources` and reduces each group to its cheapest
/// offer. Fails only on internal scoring defects or when the pass outlives
/// its budget.
pub async fn run_comparison(
    matcher: &ProductMatcher,
    sources: &[ListingSource],
    multi_progress: Option<&MultiProgress>,
) -> Result<ComparisonReport> {
    let start = Instant::now();
    let budget = pass_budget(matcher, sources);
    info!(
        "Starting comparison of {} sources ({} listings), budget {:?}",
        sources.len(),
        sources.iter().map(|s| s.listings.len()).sum::<usize>(),
        budget
    );

    let (groups, grouping_stats) = timeout(budget, group_products_by_similarity(matcher, sources, multi_progress))
        .await
        .map_err(|_| anyhow::anyhow!("Comparison pass exceeded its {:?} budget", budget))?
        .context("Grouping listings failed")?;

    let report = select_representatives(&groups);
    matcher.image_service().cache().lock().await.log_stats();
    info!(
        "Comparison run {} finished in {:.2?}: {} listings -> {} groups ({} cross-platform), {} images prefetched",
        report.run_id,
        start.elapsed(),
        grouping_stats.listings_processed,
        report.stats.total_groups,
        report.stats.cross_platform_groups,
        grouping_stats.images_prefetched
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fetcher::ImageFetcher;
    use crate::hashing::service::test_fetcher::StaticImageFetcher;
    use crate::matching::manager::test_support::matcher_with;
    use crate::models::listing::Listing;
    use crate::utils::rules_config::MatchingConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Arc;

    struct StallingFetcher;

    #[async_trait]
    impl ImageFetcher for StallingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Bytes> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            anyhow::bail!("never answered")
        }
    }

    fn sources() -> Vec<ListingSource> {
        vec![
            ListingSource::new(
                "suning",
                vec![
                    Listing::new("Acme Widget Pro 128GB Black", "").with_brand("Acme").with_price(100.0),
                    Listing::new("Zeta Gadget", "").with_brand("Zeta").with_price("¥20"),
                ],
            ),
            ListingSource::new(
                "pdd",
                vec![
                    Listing::new("Acme Widget Pro 128GB Black", "")
                        .with_brand("Acme")
                        .with_price(105.0)
                        .with_images(vec!["//img.example.com/a.jpg", "https://img.example.com/a.jpg"]),
                ],
            ),
        ]
    }

    #[test]
    fn test_budget_scales_with_distinct_images() {
        let matcher = matcher_with(MatchingConfig::default(), Arc::new(StaticImageFetcher::default()));
        // Both references normalize to the same URL.
        assert_eq!(pass_budget(&matcher, &sources()), Duration::from_secs(35));

        let fixed = MatchingConfig::builder().pass_timeout_secs(7).build().unwrap();
        let matcher = matcher_with(fixed, Arc::new(StaticImageFetcher::default()));
        assert_eq!(pass_budget(&matcher, &sources()), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_full_pass_produces_ordered_report() {
        let matcher = matcher_with(MatchingConfig::default(), Arc::new(StaticImageFetcher::default()));
        let report = run_comparison(&matcher, &sources(), None).await.unwrap();

        assert_eq!(report.groups.len(), 2);
        assert!(report.groups[0].is_cross_platform);
        assert_eq!(report.groups[0].count, 2);
        assert_eq!(report.groups[0].min_price, Some(100.0));
        assert_eq!(report.representatives[0].platform, "suning");
        assert_eq!(report.representatives[1].title, "Zeta Gadget");
        assert_eq!(report.stats.cross_platform_groups, 1);
    }

    #[tokio::test]
    async fn test_pass_timeout_is_an_error() {
        let config = MatchingConfig::builder().pass_timeout_secs(1).build().unwrap();
        let service = crate::hashing::service::ImageHashService::new(
            Arc::new(StallingFetcher),
            crate::hashing::cache::create_shared_hash_cache(8),
            &config.image_rules,
        );
        let matcher = ProductMatcher::new(Arc::new(config), service);
        let mut sources = sources();
        sources[0].listings[0].images = vec!["https://img.example.com/b.jpg".to_string()];

        let err = run_comparison(&matcher, &sources, None).await.unwrap_err();
        assert!(err.to_string().contains("budget"));
    }
}
