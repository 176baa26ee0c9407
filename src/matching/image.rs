// src/matching/image.rs

use crate::hashing::perceptual::ImageHash;
use crate::utils::rules_config::ImageRules;

/// Similarity of two image sets from their (possibly failed) hashes.
///
/// Each hashed image on the left keeps its best match on the right. Best
/// matches under the per-pair threshold are dropped; fewer than
/// `min_similar_images` survivors means no visual evidence (0). Otherwise the
/// survivors are averaged.
pub fn score_image_sets(hashes1: &[Option<ImageHash>], hashes2: &[Option<ImageHash>], rules: &ImageRules) -> f64 {
    let right: Vec<&ImageHash> = hashes2.iter().flatten().collect();
    if right.is_empty() {
        return 0.0;
    }

    let qualifying: Vec<f64> = hashes1
        .iter()
        .flatten()
        .map(|h1| right.iter().map(|h2| h1.similarity(h2)).fold(0.0, f64::max))
        .filter(|best| *best >= rules.similarity_threshold)
        .collect();

    if qualifying.is_empty() || qualifying.len() < rules.min_similar_images {
        return 0.0;
    }
    qualifying.iter().sum::<f64>() / qualifying.len() as f64
}
