// src/models/matching.rs

use serde::Serialize;

/// Per-dimension similarities for one listing pair, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub description: f64,
    pub price: f64,
    pub images: f64,
}

impl ScoreBreakdown {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("title", self.title),
            ("description", self.description),
            ("price", self.price),
            ("images", self.images),
        ]
        .into_iter()
    }
}

/// Verdict for one listing pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub is_same: bool,
    /// Weighted, platform-adjusted similarity clamped to [0, 1].
    pub similarity: f64,
    pub breakdown: ScoreBreakdown,
}
