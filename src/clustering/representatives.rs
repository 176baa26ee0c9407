// src/clustering/representatives.rs
// Picks the cheapest listing of every group and builds the run report.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::cmp::Ordering;
use uuid::Uuid;

use crate::clustering::group_products::{ProductGroup, TaggedListing};
use crate::models::listing::Listing;
use crate::models::stats_models::ComparisonStats;

/// Per-group metadata emitted alongside the representative listing.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub group_key: String,
    pub brands: Vec<String>,
    pub platforms: Vec<String>,
    pub is_cross_platform: bool,
    pub count: usize,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_item: Listing,
    pub max_item: Listing,
    pub all_items: Vec<Listing>,
}

/// Output of one comparison run. `representatives[i]` is the cheapest member
/// of `groups[i]`; cross-platform groups come first.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub representatives: Vec<Listing>,
    pub groups: Vec<GroupSummary>,
    pub stats: ComparisonStats,
}

// Known prices ascending, unknown last.
fn price_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Lowest-priced member; the earliest wins ties. Members without a price
/// only win when nobody has one.
pub fn cheapest_member(group: &ProductGroup) -> Option<&TaggedListing> {
    group.members.iter().fold(None, |best: Option<&TaggedListing>, candidate| match best {
        Some(current) if price_order(candidate.price(), current.price()) != Ordering::Less => Some(current),
        _ => Some(candidate),
    })
}

/// Highest-priced member among those with a price; the earliest wins ties.
pub fn priciest_member(group: &ProductGroup) -> Option<&TaggedListing> {
    group
        .members
        .iter()
        .filter(|m| m.price().is_some())
        .fold(None, |best: Option<&TaggedListing>, candidate| match best {
            Some(current) if candidate.price() <= current.price() => Some(current),
            _ => Some(candidate),
        })
}

fn summarize(group: &ProductGroup) -> Option<GroupSummary> {
    let min_member = cheapest_member(group)?;
    let max_member = priciest_member(group).unwrap_or(min_member);
    Some(GroupSummary {
        group_key: group.key.clone(),
        brands: group.brands(),
        platforms: group.platforms(),
        is_cross_platform: group.is_cross_platform(),
        count: group.len(),
        min_price: min_member.price(),
        max_price: max_member.price(),
        min_item: min_member.listing.clone(),
        max_item: max_member.listing.clone(),
        all_items: group.members.iter().map(|m| m.listing.clone()).collect(),
    })
}

pub fn comparison_stats(summaries: &[GroupSummary]) -> ComparisonStats {
    let total_groups = summaries.len();
    let cross_platform_groups = summaries.iter().filter(|s| s.is_cross_platform).count();
    ComparisonStats {
        total_groups,
        cross_platform_groups,
        single_platform_groups: total_groups - cross_platform_groups,
        cross_platform_percentage: if total_groups > 0 {
            cross_platform_groups as f64 / total_groups as f64 * 100.0
        } else {
            0.0
        },
    }
}

/// Builds the report: cross-platform groups first, creation order kept
/// within each partition.
pub fn select_representatives(groups: &[ProductGroup]) -> ComparisonReport {
    let (cross, single): (Vec<GroupSummary>, Vec<GroupSummary>) =
        groups.iter().filter_map(summarize).partition(|s| s.is_cross_platform);
    let summaries: Vec<GroupSummary> = cross.into_iter().chain(single).collect();

    let stats = comparison_stats(&summaries);
    log_group_debug_info(&summaries);
    log_comparison_statistics(&stats);

    ComparisonReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        representatives: summaries.iter().map(|s| s.min_item.clone()).collect(),
        groups: summaries,
        stats,
    }
}

fn format_price(price: Option<f64>) -> String {
    price.map_or_else(|| "n/a".to_string(), |p| format!("{:.2}", p))
}

fn log_group_debug_info(summaries: &[GroupSummary]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    for (n, summary) in summaries.iter().enumerate() {
        let label = if summary.is_cross_platform { "cross-platform" } else { "single-platform" };
        debug!("Group {} ({}) [{}]", n + 1, summary.group_key, label);
        debug!("  Platforms: {}", summary.platforms.join(", "));
        debug!("  Brands: {}", summary.brands.join(", "));
        debug!(
            "  {} items, price range {} - {}",
            summary.count,
            format_price(summary.min_price),
            format_price(summary.max_price)
        );
        debug!(
            "  Highest: {} | {} | {}",
            format_price(summary.max_price),
            summary.max_item.title,
            summary.max_item.platform
        );
        debug!(
            "  Lowest: {} | {} | {}",
            format_price(summary.min_price),
            summary.min_item.title,
            summary.min_item.platform
        );
        for item in &summary.all_items {
            debug!(
                "    - {} | {} | {}",
                item.platform,
                item.brand.as_deref().unwrap_or("-"),
                item.title
            );
        }
    }
}

fn log_comparison_statistics(stats: &ComparisonStats) {
    info!("Cross-platform comparison statistics:");
    info!("  Cross-platform groups: {}", stats.cross_platform_groups);
    info!("  Single-platform groups: {}", stats.single_platform_groups);
    info!("  Total groups: {}", stats.total_groups);
    info!("  Cross-platform share: {:.1}%", stats.cross_platform_percentage);
}
