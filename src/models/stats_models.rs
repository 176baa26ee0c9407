// src/models/stats_models.rs

use serde::Serialize;
use std::time::Duration;

/// Counters collected while partitioning listings into groups.
#[derive(Debug, Default, Clone)]
pub struct GroupingStats {
    pub listings_processed: usize,
    pub brand_buckets: usize,
    pub groups_created: usize,
    pub singleton_groups: usize,
    pub pairs_compared: usize,
    pub matches_found: usize,
    pub images_prefetched: usize,
    pub processing_time: Duration,
}

/// Summary of the emitted groups, serialized with the report.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ComparisonStats {
    pub total_groups: usize,
    pub cross_platform_groups: usize,
    pub single_platform_groups: usize,
    pub cross_platform_percentage: f64,
}
