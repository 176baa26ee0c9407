// src/matching/price.rs

/// Returned when either price is unknown: no signal either way.
pub const UNKNOWN_PRICE_SIMILARITY: f64 = 0.5;

/// Bounded price similarity. Relative differences above `max_percentage_diff`
/// score 0 rather than decaying further.
pub fn compare_prices(price1: Option<f64>, price2: Option<f64>, max_percentage_diff: f64) -> f64 {
    let (p1, p2) = match (price1, price2) {
        (Some(p1), Some(p2)) => (p1, p2),
        _ => return UNKNOWN_PRICE_SIMILARITY,
    };

    if p1 == 0.0 && p2 == 0.0 {
        return 1.0;
    }

    let relative_diff = (p1 - p2).abs() / p1.max(p2);
    if relative_diff <= max_percentage_diff {
        1.0 - relative_diff
    } else {
        0.0
    }
}
