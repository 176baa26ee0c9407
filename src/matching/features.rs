// src/matching/features.rs
// Canonical feature extraction for listings. Never fails: anything missing or
// malformed collapses to an empty value or an unknown price.

use crate::models::listing::{Listing, RawPrice};

pub const UNKNOWN_BRAND: &str = "unknown";

/// Normalized view of a listing used by every scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFeatures {
    pub title: String,
    pub description: String,
    /// Non-negative and finite, or `None` when the source price did not parse.
    pub price: Option<f64>,
    pub images: Vec<String>,
    pub platform: String,
    pub brand: String,
}

pub fn extract_product_features(listing: &Listing) -> CanonicalFeatures {
    CanonicalFeatures {
        title: normalize_text(&listing.title),
        description: normalize_text(listing.description.as_deref().unwrap_or_default()),
        price: listing.price.as_ref().and_then(parse_price),
        images: normalize_image_urls(&listing.images),
        platform: listing.platform.trim().to_string(),
        brand: normalize_brand(listing.brand.as_deref()),
    }
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

pub fn parse_price(price: &RawPrice) -> Option<f64> {
    match price {
        RawPrice::Amount(amount) => Some(*amount).filter(|p| p.is_finite() && *p >= 0.0),
        RawPrice::Text(text) => parse_price_text(text),
    }
}

/// Keeps only ASCII digits and '.' before parsing, so "¥1,299.00" is 1299 and
/// "询价" is unknown. Signs are stripped too, which keeps the result non-negative.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Trimmed brand, or "unknown" when missing or blank. Case is preserved.
pub fn normalize_brand(brand: Option<&str>) -> String {
    match brand.map(str::trim) {
        Some(b) if !b.is_empty() => b.to_string(),
        _ => UNKNOWN_BRAND.to_string(),
    }
}

pub fn normalize_image_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(|u| {
            if u.starts_with("//") {
                format!("https:{}", u)
            } else {
                u.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_parsing_strips_currency_and_separators() {
        assert_eq!(parse_price_text("¥1,299.00"), Some(1299.0));
        assert_eq!(parse_price_text(" 59.9元 "), Some(59.9));
        assert_eq!(parse_price_text("0"), Some(0.0));
        assert_eq!(parse_price_text("-15"), Some(15.0));
    }

    #[test]
    fn test_unparseable_price_is_unknown() {
        assert_eq!(parse_price_text("询价"), None);
        assert_eq!(parse_price_text(""), None);
        assert_eq!(parse_price_text("1.2.3"), None);
        assert_eq!(parse_price(&RawPrice::Amount(f64::NAN)), None);
        assert_eq!(parse_price(&RawPrice::Amount(-3.0)), None);
        assert_eq!(parse_price(&RawPrice::Amount(12.5)), Some(12.5));
    }

    #[test]
    fn test_extract_normalizes_listing() {
        let mut listing = Listing::new("  Acme Widget PRO ", " suning ")
            .with_price("¥100")
            .with_images(vec!["", " //img.example.com/a.jpg ", "https://img.example.com/b.jpg"]);
        listing.description = Some("Great WIDGET".to_string());

        let features = extract_product_features(&listing);
        assert_eq!(features.title, "acme widget pro");
        assert_eq!(features.description, "great widget");
        assert_eq!(features.price, Some(100.0));
        assert_eq!(
            features.images,
            vec!["https://img.example.com/a.jpg", "https://img.example.com/b.jpg"]
        );
        assert_eq!(features.platform, "suning");
        assert_eq!(features.brand, UNKNOWN_BRAND);
    }

    #[test]
    fn test_extract_tolerates_empty_listing() {
        let features = extract_product_features(&Listing::default());
        assert_eq!(features.title, "");
        assert_eq!(features.description, "");
        assert_eq!(features.price, None);
        assert!(features.images.is_empty());
        assert_eq!(features.brand, UNKNOWN_BRAND);
    }

    #[test]
    fn test_brand_keeps_case() {
        assert_eq!(normalize_brand(Some(" Acme ")), "Acme");
        assert_eq!(normalize_brand(Some("   ")), UNKNOWN_BRAND);
        assert_eq!(normalize_brand(None), UNKNOWN_BRAND);
    }
}
