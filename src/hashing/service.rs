// src/hashing/service.rs
use anyhow::Result;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::hashing::cache::{create_shared_hash_cache, SharedImageHashCache};
use crate::hashing::fetcher::{HttpImageFetcher, ImageFetcher};
use crate::hashing::perceptual::{average_hash, ImageHash};
use crate::utils::rules_config::ImageRules;

/// Hashes listing images on demand, serving repeats from the shared cache.
///
/// Fetch and decode failures are logged and reported as `None`; they never
/// abort the caller.
#[derive(Clone)]
pub struct ImageHashService {
    fetcher: Arc<dyn ImageFetcher>,
    cache: SharedImageHashCache,
    cache_failures: bool,
    max_concurrent_fetches: usize,
}

impl ImageHashService {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, cache: SharedImageHashCache, rules: &ImageRules) -> Self {
        Self {
            fetcher,
            cache,
            cache_failures: rules.cache_failures,
            max_concurrent_fetches: rules.max_concurrent_fetches.max(1),
        }
    }

    /// HTTP fetcher with the configured timeout and a fresh cache.
    pub fn from_rules(rules: &ImageRules) -> Result<Self> {
        let fetcher = HttpImageFetcher::new(rules.fetch_timeout)?;
        Ok(Self::new(
            Arc::new(fetcher),
            create_shared_hash_cache(rules.cache_capacity),
            rules,
        ))
    }

    pub fn cache(&self) -> &SharedImageHashCache {
        &self.cache
    }

    pub async fn hash_url(&self, url: &str, hash_size: u32) -> Option<ImageHash> {
        if let Some(entry) = self.cache.lock().await.get(url, hash_size) {
            return entry;
        }

        let result = self.compute_hash(url, hash_size).await;
        if result.is_some() || self.cache_failures {
            // Concurrent computations of the same key are wasted work only; last write wins.
            self.cache.lock().await.put(url, hash_size, result.clone());
        }
        result
    }

    /// Hashes every URL in order; failed entries are `None`.
    pub async fn hash_all(&self, urls: &[String], hash_size: u32) -> Vec<Option<ImageHash>> {
        let mut hashes = Vec::with_capacity(urls.len());
        for url in urls {
            hashes.push(self.hash_url(url, hash_size).await);
        }
        hashes
    }

    /// Warms the cache for the distinct, not yet cached URLs with at most
    /// `max_concurrent_fetches` in flight. Returns how many URLs were fetched.
    ///
    /// Dropping the returned future aborts every fetch it started.
    pub async fn prefetch(&self, urls: &[String], hash_size: u32, pb: Option<ProgressBar>) -> usize {
        let start = Instant::now();
        let mut pending: Vec<String> = Vec::new();
        {
            let cache = self.cache.lock().await;
            let mut seen: HashSet<&str> = HashSet::new();
            for url in urls {
                if seen.insert(url.as_str()) && !cache.contains(url, hash_size) {
                    pending.push(url.clone());
                }
            }
        }

        if pending.is_empty() {
            debug!("Image prefetch: nothing to fetch");
            return 0;
        }
        info!(
            "Prefetching {} image hashes ({} concurrent)",
            pending.len(),
            self.max_concurrent_fetches
        );
        if let Some(pb) = &pb {
            pb.set_length(pending.len() as u64);
            pb.set_message("Hashing listing images...");
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_fetches));
        let mut join_set: JoinSet<bool> = JoinSet::new();
        for url in pending.iter().cloned() {
            let service = self.clone();
            let semaphore_clone = Arc::clone(&semaphore);
            let pb_clone = pb.clone();
            join_set.spawn(async move {
                let _permit = match semaphore_clone.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("Image fetch pool closed before {} was hashed", url);
                        return false;
                    }
                };
                let hashed = service.hash_url(&url, hash_size).await.is_some();
                if let Some(pb) = &pb_clone {
                    pb.inc(1);
                }
                hashed
            });
        }

        let mut succeeded = 0;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => warn!("Image hashing task failed: {}", e),
            }
        }

        info!(
            "Image prefetch finished: {}/{} hashed in {:.2?}",
            succeeded,
            pending.len(),
            start.elapsed()
        );
        if let Some(pb) = pb {
            pb.finish_with_message(format!("Hashed {}/{} images", succeeded, pending.len()));
        }
        pending.len()
    }

    async fn compute_hash(&self, url: &str, hash_size: u32) -> Option<ImageHash> {
        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not fetch image {}: {:#}", url, e);
                return None;
            }
        };

        match tokio::task::spawn_blocking(move || average_hash(&bytes, hash_size)).await {
            Ok(Ok(hash)) => Some(hash),
            Ok(Err(e)) => {
                warn!("Could not process image {}: {:#}", url, e);
                None
            }
            Err(e) => {
                warn!("Image decoding task for {} failed: {}", url, e);
                None
            }
        }
    }
}
