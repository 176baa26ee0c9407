// src/lib.rs
//! Cross-source product matching.
//!
//! Listings scraped from several shops are normalized, compared pairwise on
//! title, description, price and perceptual image hashes, grouped into
//! "same product" clusters and reduced to the cheapest offer per cluster.

pub mod clustering;
pub mod comparison;
pub mod hashing;
pub mod matching;
pub mod models;
pub mod utils;

pub use clustering::group_products::{group_products_by_similarity, ProductGroup, TaggedListing};
pub use clustering::representatives::{select_representatives, ComparisonReport, GroupSummary};
pub use comparison::run_comparison;
pub use matching::manager::ProductMatcher;
pub use models::listing::{Listing, ListingSource, RawPrice};
pub use models::matching::{MatchResult, ScoreBreakdown};
pub use utils::rules_config::{ConfigError, MatchingConfig};
