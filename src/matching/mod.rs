// src/matching/mod.rs
//! Per-dimension scorers and the pairwise match decision built on them.

pub mod features;
pub mod image;
pub mod manager;
pub mod price;
pub mod text;

pub use features::{extract_product_features, CanonicalFeatures};
pub use manager::ProductMatcher;
