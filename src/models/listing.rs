// src/models/listing.rs
// Listing records as handed over by the scraping collaborators.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Price exactly as the source reported it: either a number or free text
/// such as "¥1,234.56" or "询价".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Amount(f64),
    Text(String),
}

impl From<f64> for RawPrice {
    fn from(amount: f64) -> Self {
        RawPrice::Amount(amount)
    }
}

impl From<&str> for RawPrice {
    fn from(text: &str) -> Self {
        RawPrice::Text(text.to_string())
    }
}

/// One scraped product listing.
///
/// Every field is optional on the wire. Both the canonical names and the
/// scraper's native `goods_*` / `shop_*` names are accepted, and nulls or
/// numbers in text fields are tolerated, so deserializing a listing only
/// fails on structurally broken input (e.g. a listing that is not an object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default, alias = "goods_title", deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "goods_price", deserialize_with = "lenient_price", skip_serializing_if = "Option::is_none")]
    pub price: Option<RawPrice>,
    #[serde(default, alias = "goods_img", deserialize_with = "lenient_images")]
    pub images: Vec<String>,
    #[serde(default, alias = "shop_platform", deserialize_with = "lenient_string")]
    pub platform: String,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    // Passthrough metadata, preserved for the representative listing.
    #[serde(default, alias = "shop_title", deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub shop: Option<String>,
    #[serde(default, alias = "goods_link", deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, alias = "goods_sales", deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub sales: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub search_keyword: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub page_type: Option<String>,
    #[serde(default, alias = "grab_time", deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
}

impl Listing {
    pub fn new(title: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            platform: platform.into(),
            ..Default::default()
        }
    }

    pub fn with_price(mut self, price: impl Into<RawPrice>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.images = images.into_iter().map(Into::into).collect();
        self
    }

    /// Fills a missing or blank description from the title. Every caller of
    /// the matcher applies this so a pair scores the same wherever it is compared.
    pub fn with_description_fallback(mut self) -> Self {
        if self.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
            self.description = Some(self.title.clone());
        }
        self
    }
}

/// A batch of listings scraped from one source, tagged with that source's name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingSource {
    pub platform: String,
    pub listings: Vec<Listing>,
}

impl ListingSource {
    pub fn new(platform: impl Into<String>, listings: Vec<Listing>) -> Self {
        Self {
            platform: platform.into(),
            listings,
        }
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

fn lenient_price<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<RawPrice>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Number(n) => n.as_f64().map(RawPrice::Amount),
        Value::String(s) => Some(RawPrice::Text(s)),
        other => Some(RawPrice::Text(other.to_string())),
    })
}

/// Accepts a list of URLs, a single URL string, or null.
fn lenient_images<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(value_to_string).collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_canonical_fields() {
        let listing: Listing = serde_json::from_str(
            r#"{"title": "Acme Widget", "price": "¥99.00", "images": ["https://a/1.jpg"],
                "platform": "suning", "brand": "Acme", "search_keyword": "widget"}"#,
        )
        .unwrap();
        assert_eq!(listing.title, "Acme Widget");
        assert_eq!(listing.price, Some(RawPrice::Text("¥99.00".to_string())));
        assert_eq!(listing.images, vec!["https://a/1.jpg"]);
        assert_eq!(listing.brand.as_deref(), Some("Acme"));
        assert_eq!(listing.search_keyword.as_deref(), Some("widget"));
    }

    #[test]
    fn test_deserialize_scraper_aliases() {
        let listing: Listing = serde_json::from_str(
            r#"{"goods_title": "李宁 跑鞋", "goods_price": 259.5, "goods_img": "//img.example.com/a.jpg",
                "goods_sales": 1200, "shop_title": "李宁官方旗舰店", "shop_platform": "拼多多",
                "goods_link": "https://example.com/g/1", "grab_time": "2024-05-01 10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(listing.title, "李宁 跑鞋");
        assert_eq!(listing.price, Some(RawPrice::Amount(259.5)));
        assert_eq!(listing.images, vec!["//img.example.com/a.jpg"]);
        assert_eq!(listing.sales.as_deref(), Some("1200"));
        assert_eq!(listing.platform, "拼多多");
        assert_eq!(listing.captured_at.as_deref(), Some("2024-05-01 10:00:00"));
    }

    #[test]
    fn test_deserialize_tolerates_missing_and_null() {
        let listing: Listing =
            serde_json::from_str(r#"{"title": null, "price": null, "goods_img": ""}"#).unwrap();
        assert_eq!(listing.title, "");
        assert!(listing.price.is_none());
        assert!(listing.images.is_empty());
        assert!(listing.brand.is_none());

        let empty: Listing = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Listing::default());
    }

    #[test]
    fn test_description_fallback_only_fills_blanks() {
        let filled = Listing::new("Acme Widget", "suning").with_description_fallback();
        assert_eq!(filled.description.as_deref(), Some("Acme Widget"));

        let mut blank = Listing::new("Acme Widget", "suning");
        blank.description = Some("  ".to_string());
        assert_eq!(blank.with_description_fallback().description.as_deref(), Some("Acme Widget"));

        let mut described = Listing::new("Acme Widget", "suning");
        described.description = Some("A widget".to_string());
        assert_eq!(described.with_description_fallback().description.as_deref(), Some("A widget"));
    }

    #[test]
    fn test_serialize_skips_absent_metadata() {
        let listing = Listing::new("Acme Widget", "suning").with_price(100.0);
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["price"], serde_json::json!(100.0));
        assert!(json.get("brand").is_none());
        assert!(json.get("link").is_none());
    }
}
