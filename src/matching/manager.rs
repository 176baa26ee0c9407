// src/matching/manager.rs
use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::hashing::service::ImageHashService;
use crate::matching::features::{extract_product_features, CanonicalFeatures};
use crate::matching::image::score_image_sets;
use crate::matching::price::compare_prices;
use crate::matching::text::compare_text;
use crate::models::listing::Listing;
use crate::models::matching::{MatchResult, ScoreBreakdown};
use crate::utils::rules_config::MatchingConfig;

/// Match decision engine: scores a listing pair on title, description, price
/// and images, then applies the platform factor and the threshold.
#[derive(Clone)]
pub struct ProductMatcher {
    config: Arc<MatchingConfig>,
    image_service: ImageHashService,
}

impl ProductMatcher {
    pub fn new(config: Arc<MatchingConfig>, image_service: ImageHashService) -> Self {
        Self { config, image_service }
    }

    /// Matcher backed by HTTP image fetching and a fresh LRU cache.
    pub fn with_http_fetcher(config: Arc<MatchingConfig>) -> Result<Self> {
        let image_service = ImageHashService::from_rules(&config.image_rules)?;
        Ok(Self::new(config, image_service))
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn image_service(&self) -> &ImageHashService {
        &self.image_service
    }

    pub async fn is_same_product(&self, listing1: &Listing, listing2: &Listing) -> Result<MatchResult> {
        let features1 = extract_product_features(listing1);
        let features2 = extract_product_features(listing2);
        self.match_features(&features1, &features2).await
    }

    /// Scores two pre-extracted feature sets.
    ///
    /// An error here means a scorer produced a non-finite or out-of-range
    /// value, which is a defect rather than bad input.
    pub async fn match_features(&self, f1: &CanonicalFeatures, f2: &CanonicalFeatures) -> Result<MatchResult> {
        let breakdown = ScoreBreakdown {
            title: compare_text(&f1.title, &f2.title),
            description: compare_text(&f1.description, &f2.description),
            price: compare_prices(f1.price, f2.price, self.config.price_rules.max_percentage_diff),
            images: self.compare_images(&f1.images, &f2.images).await,
        };
        self.combine_scores(breakdown, f1.platform == f2.platform)
    }

    async fn compare_images(&self, images1: &[String], images2: &[String]) -> f64 {
        if images1.is_empty() || images2.is_empty() {
            return 0.0;
        }
        let rules = &self.config.image_rules;
        let hashes1 = self.image_service.hash_all(images1, rules.hash_size).await;
        let hashes2 = self.image_service.hash_all(images2, rules.hash_size).await;
        score_image_sets(&hashes1, &hashes2, rules)
    }

    fn combine_scores(&self, breakdown: ScoreBreakdown, same_platform: bool) -> Result<MatchResult> {
        for (dimension, score) in breakdown.iter() {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                anyhow::bail!("{} similarity out of range: {}", dimension, score);
            }
        }

        let weights = &self.config.weights;
        let weighted = breakdown.title * weights.title
            + breakdown.description * weights.description
            + breakdown.price * weights.price
            + breakdown.images * weights.images;

        let factor = if same_platform {
            self.config.platform_adjustment.same_platform
        } else {
            self.config.platform_adjustment.cross_platform
        };
        let adjusted = weighted * factor;
        if !adjusted.is_finite() {
            anyhow::bail!("aggregate similarity is not finite: {}", adjusted);
        }

        let is_same = adjusted >= self.config.similarity_threshold;
        debug!(
            "Pair scores: title={:.3}, description={:.3}, price={:.3}, images={:.3}, weighted={:.3}, factor={:.2} ({} platform) -> {:.3} same={}",
            breakdown.title,
            breakdown.description,
            breakdown.price,
            breakdown.images,
            weighted,
            factor,
            if same_platform { "same" } else { "cross" },
            adjusted,
            is_same
        );

        Ok(MatchResult {
            is_same,
            similarity: adjusted.clamp(0.0, 1.0),
            breakdown,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::matcher_with;
    use super::*;
    use crate::hashing::perceptual::test_images::split_png;
    use crate::hashing::service::test_fetcher::StaticImageFetcher;

    fn matcher() -> ProductMatcher {
        matcher_with(MatchingConfig::default(), Arc::new(StaticImageFetcher::default()))
    }

    fn listing(title: &str, platform: &str, price: f64) -> Listing {
        let mut listing = Listing::new(title, platform).with_price(price).with_brand("Acme");
        listing.description = Some(title.to_string());
        listing
    }

    #[tokio::test]
    async fn test_identical_cross_platform_listings_match() {
        let a = listing("Acme Widget Pro 128GB Black", "suning", 100.0);
        let b = listing("Acme Widget Pro 128GB Black", "pdd", 105.0);

        let result = matcher().is_same_product(&a, &b).await.unwrap();
        assert!(result.is_same);
        assert_eq!(result.breakdown.title, 1.0);
        assert_eq!(result.breakdown.images, 0.0);
        // (0.4 + 0.2 + 0.2 * (1 - 5/105)) * 1.2 = 0.948...
        let expected = (0.6 + 0.2 * (1.0 - 5.0 / 105.0)) * 1.2;
        assert!((result.similarity - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_same_platform_is_penalized() {
        let a = listing("Acme Widget Pro 128GB Black", "suning", 100.0);
        let b = listing("Acme Widget Pro 128GB Black", "suning", 100.0);

        let result = matcher().is_same_product(&a, &b).await.unwrap();
        // (0.4 + 0.2 + 0.2) * 0.5
        assert!((result.similarity - 0.4).abs() < 1e-9);
        assert!(!result.is_same);
    }

    #[tokio::test]
    async fn test_dissimilar_titles_do_not_match() {
        let a = listing("Acme Widget", "suning", 100.0);
        let b = listing("Zeta Gadget", "suning", 100.0);
        assert!(!matcher().is_same_product(&a, &b).await.unwrap().is_same);

        let far = listing("Zeta Gadget", "pdd", 5.0);
        let result = matcher().is_same_product(&a, &far).await.unwrap();
        assert_eq!(result.breakdown.price, 0.0);
        assert!(!result.is_same);
    }

    #[tokio::test]
    async fn test_unparseable_price_scores_half() {
        let a = Listing::new("Acme Widget", "suning").with_price("询价");
        let b = listing("Acme Widget", "pdd", 100.0);
        let result = matcher().is_same_product(&a, &b).await.unwrap();
        assert_eq!(result.breakdown.price, 0.5);
        // Missing description on one side scores 0.
        assert_eq!(result.breakdown.description, 0.0);
    }

    #[tokio::test]
    async fn test_images_contribute_through_hash_service() {
        let fetcher = Arc::new(
            StaticImageFetcher::default()
                .with_image("https://img/a.png", split_png(32, true))
                .with_image("https://img/b.png", split_png(32, true)),
        );
        let config = MatchingConfig::builder().hash_size(8).build().unwrap();
        let matcher = matcher_with(config, fetcher);

        let a = listing("Acme Widget", "suning", 100.0).with_images(vec!["https://img/a.png"]);
        let b = listing("Acme Widget", "pdd", 100.0).with_images(vec!["https://img/b.png", "https://img/404.png"]);
        let result = matcher.is_same_product(&a, &b).await.unwrap();
        assert_eq!(result.breakdown.images, 1.0);
        assert_eq!(result.similarity, 1.0);
    }

    #[tokio::test]
    async fn test_similarity_is_clamped_but_verdict_kept() {
        let config = MatchingConfig::builder().platform_adjustment(0.5, 3.0).build().unwrap();
        let matcher = matcher_with(config, Arc::new(StaticImageFetcher::default()));
        let a = listing("Acme Widget", "suning", 100.0);
        let b = listing("Acme Widget", "pdd", 100.0);
        let result = matcher.is_same_product(&a, &b).await.unwrap();
        assert_eq!(result.similarity, 1.0);
        assert!(result.is_same);
    }
}
