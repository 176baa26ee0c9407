// src/utils/rules_config.rs
//! Matching rules: weights, thresholds and image/price policies.
//!
//! Rules are read from a YAML file whose every key is optional. Missing keys
//! get their defaults in `MatchingConfigBuilder::build`, which is also where
//! all validation happens. The resulting `MatchingConfig` is never mutated.

use encoding_rs::{Encoding, GB18030, UTF_8, WINDOWS_1252};
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const RULES_PATH_ENV: &str = "MATCHING_RULES_PATH";
pub const DEFAULT_RULES_PATH: &str = "config/rules.yaml";

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;
const DEFAULT_TITLE_WEIGHT: f64 = 0.4;
const DEFAULT_DESCRIPTION_WEIGHT: f64 = 0.2;
const DEFAULT_PRICE_WEIGHT: f64 = 0.2;
const DEFAULT_IMAGES_WEIGHT: f64 = 0.2;
const DEFAULT_SAME_PLATFORM_FACTOR: f64 = 0.5;
const DEFAULT_CROSS_PLATFORM_FACTOR: f64 = 1.2;
const DEFAULT_MAX_PERCENTAGE_DIFF: f64 = 0.9;
const DEFAULT_HASH_SIZE: u32 = 32;
const DEFAULT_MIN_SIMILAR_IMAGES: usize = 1;
const DEFAULT_IMAGE_SIMILARITY_THRESHOLD: f64 = 0.8;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CACHE_CAPACITY: usize = 10_000;
const MAX_HASH_SIZE: u32 = 64;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rules file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode rules file {} (tried {tried})", path.display())]
    Encoding { path: PathBuf, tried: String },

    #[error("YAML error in rules file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid rule `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchWeights {
    pub title: f64,
    pub description: f64,
    pub price: f64,
    pub images: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformAdjustment {
    /// Multiplier applied when both listings come from the same platform.
    pub same_platform: f64,
    /// Multiplier applied when the listings come from different platforms.
    pub cross_platform: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRules {
    pub max_percentage_diff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRules {
    /// Side length N of the N×N average hash.
    pub hash_size: u32,
    pub min_similar_images: usize,
    pub similarity_threshold: f64,
    pub fetch_timeout: Duration,
    pub cache_capacity: usize,
    pub max_concurrent_fetches: usize,
    pub cache_failures: bool,
}

/// Fully resolved matching rules.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub similarity_threshold: f64,
    pub weights: MatchWeights,
    pub platform_adjustment: PlatformAdjustment,
    pub price_rules: PriceRules,
    pub image_rules: ImageRules,
    /// Fixed wall-clock budget for a comparison pass; derived from the image
    /// count when absent.
    pub pass_timeout: Option<Duration>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        // Defaults are always valid.
        MatchingConfigBuilder::default()
            .build()
            .unwrap_or_else(|e| unreachable!("default matching rules rejected: {e}"))
    }
}

impl MatchingConfig {
    pub fn builder() -> MatchingConfigBuilder {
        MatchingConfigBuilder::default()
    }

    /// Loads rules from `path`, trying several text encodings.
    pub fn from_rules_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = read_rules_file(path)?;
        MatchingConfigBuilder::from_raw(raw.matching.unwrap_or_default()).build()
    }

    /// Resolves the rules path from an explicit value, then `MATCHING_RULES_PATH`,
    /// then `config/rules.yaml`, and loads it.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(RULES_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RULES_PATH));
        info!("Loading matching rules from {}", path.display());
        Self::from_rules_file(path)
    }

    pub fn log_config(&self) {
        info!("🧮 Matching rules:");
        info!("   Similarity threshold: {:.2}", self.similarity_threshold);
        info!(
            "   Weights: title={:.2}, description={:.2}, price={:.2}, images={:.2}",
            self.weights.title, self.weights.description, self.weights.price, self.weights.images
        );
        info!(
            "   Platform factors: same={:.2}, cross={:.2}",
            self.platform_adjustment.same_platform, self.platform_adjustment.cross_platform
        );
        info!("   Max price difference: {:.0}%", self.price_rules.max_percentage_diff * 100.0);
        info!(
            "   Images: hash {}x{}, min similar={}, threshold={:.2}, fetch timeout={:?}",
            self.image_rules.hash_size,
            self.image_rules.hash_size,
            self.image_rules.min_similar_images,
            self.image_rules.similarity_threshold,
            self.image_rules.fetch_timeout
        );
        info!(
            "   Image cache: capacity={}, cache failures={}, max concurrent fetches={}",
            self.image_rules.cache_capacity,
            self.image_rules.cache_failures,
            self.image_rules.max_concurrent_fetches
        );
        match self.pass_timeout {
            Some(timeout) => info!("   Pass timeout: {:?}", timeout),
            None => info!("   Pass timeout: derived from image count"),
        }
    }
}

// On-disk shape. Everything is optional.

#[derive(Debug, Default, Deserialize)]
struct RawRulesFile {
    matching: Option<RawMatching>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMatching {
    similarity_threshold: Option<f64>,
    weights: Option<RawWeights>,
    platform_adjustment: Option<RawPlatformAdjustment>,
    price_rules: Option<RawPriceRules>,
    image_rules: Option<RawImageRules>,
    pass_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawWeights {
    title: Option<f64>,
    description: Option<f64>,
    price: Option<f64>,
    images: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPlatformAdjustment {
    same_platform: Option<f64>,
    cross_platform: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPriceRules {
    max_percentage_diff: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawImageRules {
    hash_size: Option<u32>,
    min_similar_images: Option<usize>,
    similarity_threshold: Option<f64>,
    fetch_timeout_secs: Option<u64>,
    cache_capacity: Option<usize>,
    max_concurrent_fetches: Option<usize>,
    cache_failures: Option<bool>,
}

fn read_rules_file(path: &Path) -> Result<RawRulesFile, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound { path: path.to_path_buf() }
        } else {
            ConfigError::Io { path: path.to_path_buf(), source }
        }
    })?;

    let text = decode_rules_text(&bytes).ok_or_else(|| ConfigError::Encoding {
        path: path.to_path_buf(),
        tried: "UTF-8, GB18030, Latin-1".to_string(),
    })?;

    if text.trim().is_empty() {
        debug!("Rules file {} is empty, using defaults", path.display());
        return Ok(RawRulesFile::default());
    }

    // A syntax error is final: the text decoded, so another encoding would not help.
    serde_yaml::from_str::<Option<RawRulesFile>>(&text)
        .map(Option::unwrap_or_default)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

fn decode_rules_text(bytes: &[u8]) -> Option<String> {
    let candidates: [(&str, &'static Encoding); 3] =
        [("UTF-8", UTF_8), ("GB18030", GB18030), ("Latin-1", WINDOWS_1252)];

    for (label, encoding) in candidates {
        let body = if encoding == UTF_8 {
            bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
        } else {
            bytes
        };
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
            info!("Decoded matching rules as {}", label);
            return Some(text.into_owned());
        }
        debug!("Matching rules are not valid {}", label);
    }
    None
}

/// Collects rule overrides and produces a validated `MatchingConfig`.
#[derive(Debug, Clone, Default)]
pub struct MatchingConfigBuilder {
    similarity_threshold: Option<f64>,
    title_weight: Option<f64>,
    description_weight: Option<f64>,
    price_weight: Option<f64>,
    images_weight: Option<f64>,
    same_platform_factor: Option<f64>,
    cross_platform_factor: Option<f64>,
    max_percentage_diff: Option<f64>,
    hash_size: Option<u32>,
    min_similar_images: Option<usize>,
    image_similarity_threshold: Option<f64>,
    fetch_timeout_secs: Option<u64>,
    cache_capacity: Option<usize>,
    max_concurrent_fetches: Option<usize>,
    cache_failures: Option<bool>,
    pass_timeout_secs: Option<u64>,
}

impl MatchingConfigBuilder {
    fn from_raw(raw: RawMatching) -> Self {
        let weights = raw.weights.unwrap_or_default();
        let platform = raw.platform_adjustment.unwrap_or_default();
        let price = raw.price_rules.unwrap_or_default();
        let image = raw.image_rules.unwrap_or_default();
        Self {
            similarity_threshold: raw.similarity_threshold,
            title_weight: weights.title,
            description_weight: weights.description,
            price_weight: weights.price,
            images_weight: weights.images,
            same_platform_factor: platform.same_platform,
            cross_platform_factor: platform.cross_platform,
            max_percentage_diff: price.max_percentage_diff,
            hash_size: image.hash_size,
            min_similar_images: image.min_similar_images,
            image_similarity_threshold: image.similarity_threshold,
            fetch_timeout_secs: image.fetch_timeout_secs,
            cache_capacity: image.cache_capacity,
            max_concurrent_fetches: image.max_concurrent_fetches,
            cache_failures: image.cache_failures,
            pass_timeout_secs: raw.pass_timeout_secs,
        }
    }

    pub fn similarity_threshold(mut self, value: f64) -> Self {
        self.similarity_threshold = Some(value);
        self
    }

    pub fn weights(mut self, title: f64, description: f64, price: f64, images: f64) -> Self {
        self.title_weight = Some(title);
        self.description_weight = Some(description);
        self.price_weight = Some(price);
        self.images_weight = Some(images);
        self
    }

    pub fn platform_adjustment(mut self, same_platform: f64, cross_platform: f64) -> Self {
        self.same_platform_factor = Some(same_platform);
        self.cross_platform_factor = Some(cross_platform);
        self
    }

    pub fn max_percentage_diff(mut self, value: f64) -> Self {
        self.max_percentage_diff = Some(value);
        self
    }

    pub fn hash_size(mut self, value: u32) -> Self {
        self.hash_size = Some(value);
        self
    }

    pub fn min_similar_images(mut self, value: usize) -> Self {
        self.min_similar_images = Some(value);
        self
    }

    pub fn image_similarity_threshold(mut self, value: f64) -> Self {
        self.image_similarity_threshold = Some(value);
        self
    }

    pub fn fetch_timeout_secs(mut self, value: u64) -> Self {
        self.fetch_timeout_secs = Some(value);
        self
    }

    pub fn cache_capacity(mut self, value: usize) -> Self {
        self.cache_capacity = Some(value);
        self
    }

    pub fn max_concurrent_fetches(mut self, value: usize) -> Self {
        self.max_concurrent_fetches = Some(value);
        self
    }

    pub fn cache_failures(mut self, value: bool) -> Self {
        self.cache_failures = Some(value);
        self
    }

    pub fn pass_timeout_secs(mut self, value: u64) -> Self {
        self.pass_timeout_secs = Some(value);
        self
    }

    pub fn build(self) -> Result<MatchingConfig, ConfigError> {
        let similarity_threshold = unit_interval(
            "similarity_threshold",
            self.similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
        )?;
        let weights = MatchWeights {
            title: non_negative("weights.title", self.title_weight.unwrap_or(DEFAULT_TITLE_WEIGHT))?,
            description: non_negative(
                "weights.description",
                self.description_weight.unwrap_or(DEFAULT_DESCRIPTION_WEIGHT),
            )?,
            price: non_negative("weights.price", self.price_weight.unwrap_or(DEFAULT_PRICE_WEIGHT))?,
            images: non_negative("weights.images", self.images_weight.unwrap_or(DEFAULT_IMAGES_WEIGHT))?,
        };
        let platform_adjustment = PlatformAdjustment {
            same_platform: non_negative(
                "platform_adjustment.same_platform",
                self.same_platform_factor.unwrap_or(DEFAULT_SAME_PLATFORM_FACTOR),
            )?,
            cross_platform: non_negative(
                "platform_adjustment.cross_platform",
                self.cross_platform_factor.unwrap_or(DEFAULT_CROSS_PLATFORM_FACTOR),
            )?,
        };
        let price_rules = PriceRules {
            max_percentage_diff: non_negative(
                "price_rules.max_percentage_diff",
                self.max_percentage_diff.unwrap_or(DEFAULT_MAX_PERCENTAGE_DIFF),
            )?,
        };

        let hash_size = self.hash_size.unwrap_or(DEFAULT_HASH_SIZE);
        if hash_size == 0 || hash_size > MAX_HASH_SIZE {
            return Err(ConfigError::Invalid {
                field: "image_rules.hash_size",
                reason: format!("must be between 1 and {MAX_HASH_SIZE}, got {hash_size}"),
            });
        }
        let fetch_timeout_secs = at_least_one(
            "image_rules.fetch_timeout_secs",
            self.fetch_timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        )?;
        let cache_capacity = at_least_one(
            "image_rules.cache_capacity",
            self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
        )?;
        let max_concurrent_fetches = at_least_one(
            "image_rules.max_concurrent_fetches",
            self.max_concurrent_fetches
                .unwrap_or_else(|| num_cpus::get().min(8)),
        )?;
        let image_rules = ImageRules {
            hash_size,
            min_similar_images: self.min_similar_images.unwrap_or(DEFAULT_MIN_SIMILAR_IMAGES),
            similarity_threshold: unit_interval(
                "image_rules.similarity_threshold",
                self.image_similarity_threshold
                    .unwrap_or(DEFAULT_IMAGE_SIMILARITY_THRESHOLD),
            )?,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            cache_capacity,
            max_concurrent_fetches,
            cache_failures: self.cache_failures.unwrap_or(true),
        };

        let pass_timeout = match self.pass_timeout_secs {
            Some(secs) => Some(Duration::from_secs(at_least_one("pass_timeout_secs", secs)?)),
            None => None,
        };

        Ok(MatchingConfig {
            similarity_threshold,
            weights,
            platform_adjustment,
            price_rules,
            image_rules,
            pass_timeout,
        })
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be within [0, 1], got {value}") })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be a finite value >= 0, got {value}") })
    }
}

fn at_least_one<T>(field: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + From<u8> + std::fmt::Display + Copy,
{
    if value >= T::from(1u8) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be at least 1, got {value}") })
    }
}
