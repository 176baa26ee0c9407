// src/hashing/mod.rs
//! Perceptual image hashing for listing photos.
//!
//! `perceptual` computes average hashes from raw bytes, `fetcher` is the
//! network seam, `cache` memoizes results per (url, hash size) and `service`
//! ties the three together for the matcher.

pub mod cache;
pub mod fetcher;
pub mod perceptual;
pub mod service;

pub use cache::{create_shared_hash_cache, ImageHashCache, SharedImageHashCache};
pub use fetcher::{HttpImageFetcher, ImageFetcher};
pub use perceptual::{average_hash, ImageHash};
pub use service::ImageHashService;
