// src/clustering/group_products.rs
//! Partitions listings from several sources into groups of the same product.
//!
//! Listings are bucketed by exact brand, then each bucket is scanned in input
//! order: the earliest unassigned listing seeds a group and pulls in every
//! later unassigned listing that matches it. Matches are only ever tested
//! against the seed, so membership is not transitive.

use anyhow::{Context, Result};
use indicatif::MultiProgress;
use log::{debug, info};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::matching::features::{extract_product_features, CanonicalFeatures};
use crate::matching::manager::ProductMatcher;
use crate::models::listing::{Listing, ListingSource};
use crate::models::stats_models::GroupingStats;
use crate::utils::progress_config::phase_progress_bar;

/// A listing tagged with its source and position in the combined input.
#[derive(Debug, Clone)]
pub struct TaggedListing {
    pub index: usize,
    pub listing: Listing,
    pub features: CanonicalFeatures,
}

impl TaggedListing {
    pub fn platform(&self) -> &str {
        &self.listing.platform
    }

    pub fn brand(&self) -> &str {
        &self.features.brand
    }

    pub fn price(&self) -> Option<f64> {
        self.features.price
    }
}

/// One cluster of listings judged to be the same product, in input order.
#[derive(Debug, Clone)]
pub struct ProductGroup {
    pub key: String,
    pub members: Vec<TaggedListing>,
}

impl ProductGroup {
    /// Distinct platforms, sorted.
    pub fn platforms(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.members.iter().map(TaggedListing::platform).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Distinct brands, sorted.
    pub fn brands(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.members.iter().map(TaggedListing::brand).collect();
        set.into_iter().map(str::to_string).collect()
    }

    pub fn is_cross_platform(&self) -> bool {
        self.platforms().len() > 1
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Flattens the sources into one sequence. The trimmed source name becomes
/// each listing's platform and a missing description is filled from the title.
pub fn tag_listings(sources: &[ListingSource]) -> Vec<TaggedListing> {
    sources
        .iter()
        .flat_map(|source| {
            let platform = source.platform.trim();
            source.listings.iter().map(move |listing| {
                let mut listing = listing.clone();
                listing.platform = platform.to_string();
                listing.with_description_fallback()
            })
        })
        .enumerate()
        .map(|(index, listing)| {
            let features = extract_product_features(&listing);
            TaggedListing { index, listing, features }
        })
        .collect()
}

/// Brand buckets in first-seen order, holding indices into `listings`.
fn bucket_by_brand(listings: &[TaggedListing]) -> Vec<(String, Vec<usize>)> {
    let mut buckets: Vec<(String, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for (idx, tagged) in listings.iter().enumerate() {
        match positions.get(tagged.brand()) {
            Some(&pos) => buckets[pos].1.push(idx),
            None => {
                positions.insert(tagged.brand(), buckets.len());
                buckets.push((tagged.brand().to_string(), vec![idx]));
            }
        }
    }
    buckets
}

pub async fn group_products_by_similarity(
    matcher: &ProductMatcher,
    sources: &[ListingSource],
    multi_progress: Option<&MultiProgress>,
) -> Result<(Vec<ProductGroup>, GroupingStats)> {
    let start = Instant::now();
    let tagged = tag_listings(sources);
    let buckets = bucket_by_brand(&tagged);
    let mut stats = GroupingStats {
        listings_processed: tagged.len(),
        brand_buckets: buckets.len(),
        ..Default::default()
    };
    info!(
        "Grouping {} listings from {} sources in {} brand buckets",
        tagged.len(),
        sources.len(),
        buckets.len()
    );

    // Only listings that will be compared need their images.
    let image_urls: Vec<String> = buckets
        .iter()
        .filter(|(_, members)| members.len() >= 2)
        .flat_map(|(_, members)| members.iter().flat_map(|&idx| tagged[idx].features.images.iter().cloned()))
        .collect();
    if !image_urls.is_empty() {
        let pb = phase_progress_bar(multi_progress, image_urls.len() as u64, "Hashing listing images...")?;
        stats.images_prefetched = matcher
            .image_service()
            .prefetch(&image_urls, matcher.config().image_rules.hash_size, pb)
            .await;
    }

    let pb = phase_progress_bar(multi_progress, tagged.len() as u64, "Matching within brand buckets...")?;
    let mut assigned = vec![false; tagged.len()];
    let mut member_indices: Vec<Vec<usize>> = Vec::new();

    for (brand, members) in &buckets {
        debug!("Brand bucket '{}': {} listings", brand, members.len());
        for (pos, &seed) in members.iter().enumerate() {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut group = vec![seed];

            for &candidate in &members[pos + 1..] {
                if assigned[candidate] {
                    continue;
                }
                let result = matcher
                    .match_features(&tagged[seed].features, &tagged[candidate].features)
                    .await
                    .with_context(|| {
                        format!("Failed to compare listing {} with listing {}", seed, candidate)
                    })?;
                stats.pairs_compared += 1;
                if result.is_same {
                    stats.matches_found += 1;
                    assigned[candidate] = true;
                    group.push(candidate);
                }
            }

            if let Some(pb) = &pb {
                pb.inc(group.len() as u64);
            }
            member_indices.push(group);
        }
    }

    let mut slots: Vec<Option<TaggedListing>> = tagged.into_iter().map(Some).collect();
    let groups: Vec<ProductGroup> = member_indices
        .into_iter()
        .enumerate()
        .map(|(n, indices)| ProductGroup {
            key: format!("group_{}", n + 1),
            members: indices.into_iter().filter_map(|idx| slots[idx].take()).collect(),
        })
        .collect();

    stats.groups_created = groups.len();
    stats.singleton_groups = groups.iter().filter(|g| g.len() == 1).count();
    stats.processing_time = start.elapsed();

    if let Some(pb) = pb {
        pb.finish_with_message(format!("Formed {} groups", groups.len()));
    }
    info!(
        "Grouping complete: {} groups ({} singletons) from {} listings, {} pairs compared, {} matches in {:.2?}",
        stats.groups_created,
        stats.singleton_groups,
        stats.listings_processed,
        stats.pairs_compared,
        stats.matches_found,
        stats.processing_time
    );

    Ok((groups, stats))
}
