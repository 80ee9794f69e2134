use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a query is a barcode or a free-text product name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchType {
    Barcode,
    Name,
}

impl SearchType {
    /// Guess the search type from a raw query string.
    ///
    /// Only digits, spaces and dashes are allowed in a barcode query, and the
    /// digit count must be one of the supported barcode lengths.
    pub fn detect(query: &str) -> Self {
        let trimmed = query.trim();
        if trimmed.is_empty()
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || c == '-' || c == ' ')
        {
            return SearchType::Name;
        }
        let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
        match digits {
            8 | 11 | 12 | 13 | 14 => SearchType::Barcode,
            _ => SearchType::Name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Barcode => "barcode",
            SearchType::Name => "name",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image URL together with the source that supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributedUrl {
    pub url: String,
    pub source: String,
}

impl AttributedUrl {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// Structured nutrient record. Values are per `basis` (e.g. "100g").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_kcal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturated_fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbohydrates: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugars: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium: Option<f64>,
}

impl NutritionFacts {
    pub fn is_empty(&self) -> bool {
        self.energy_kcal.is_none()
            && self.fat.is_none()
            && self.saturated_fat.is_none()
            && self.carbohydrates.is_none()
            && self.sugars.is_none()
            && self.fiber.is_none()
            && self.protein.is_none()
            && self.salt.is_none()
            && self.sodium.is_none()
    }
}

/// A retail price offered by one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub store: String,
    pub price: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One aggregated product candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLookupResult {
    /// Source name -> that source's own identifier for the product.
    #[serde(default)]
    pub data_sources: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_size_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<AttributedUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<AttributedUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionFacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prices: Vec<PriceQuote>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_data: BTreeMap<String, serde_json::Value>,
}

impl ProductLookupResult {
    /// A result attributed to `source_id` under the source's own identifier.
    pub fn from_source(source_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        let mut result = Self::default();
        result
            .data_sources
            .insert(source_id.into(), external_id.into());
        result
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand_name = Some(brand.into());
        self
    }

    /// Add a category unless an equal one (ignoring case) is already present.
    pub fn add_category(&mut self, category: &str) {
        let category = category.trim();
        if category.is_empty() {
            return;
        }
        let folded = category.to_lowercase();
        if !self.categories.iter().any(|c| c.to_lowercase() == folded) {
            self.categories.push(category.to_string());
        }
    }

    pub fn has_source(&self, source_id: &str) -> bool {
        self.data_sources.contains_key(source_id)
    }
}

/// Small helper for plugin mapping code: trimmed, non-empty strings only.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_search_type() {
        assert_eq!(SearchType::detect("761720051108"), SearchType::Barcode);
        assert_eq!(SearchType::detect(" 761-720-051108 "), SearchType::Barcode);
        assert_eq!(SearchType::detect("96385074"), SearchType::Barcode);
        assert_eq!(SearchType::detect("nutella"), SearchType::Name);
        assert_eq!(SearchType::detect("7up 12345678"), SearchType::Name);
        assert_eq!(SearchType::detect("12345"), SearchType::Name);
        assert_eq!(SearchType::detect(""), SearchType::Name);
    }

    #[test]
    fn test_add_category_dedups_ignoring_case() {
        let mut result = ProductLookupResult::default();
        result.add_category("Snacks");
        result.add_category("snacks");
        result.add_category("  ");
        result.add_category("Spreads");
        assert_eq!(result.categories, vec!["Snacks", "Spreads"]);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = ProductLookupResult::from_source("openfoodfacts", "3017620422003")
            .with_barcode("3017620422003")
            .with_brand("Ferrero");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["brandName"], "Ferrero");
        assert_eq!(json["dataSources"]["openfoodfacts"], "3017620422003");
        assert!(json.get("nutrition").is_none());
    }
}
