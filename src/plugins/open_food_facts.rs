use crate::barcode::{generate_variants, normalize_digits, BarcodeFormat};
use crate::constants::OPEN_FOOD_FACTS_PLUGIN;
use crate::error::{PluginError, PluginResult};
use crate::plugins::http::{JsonHttpClient, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::plugins::{Plugin, PluginMode, ProductLookupPlugin};
use crate::types::{non_empty, AttributedUrl, NutritionFacts, ProductLookupResult, SearchType};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenFoodFactsSettings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for OpenFoodFactsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://world.openfoodfacts.org".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Source-mode plugin backed by the Open Food Facts product database.
/// Authoritative for nutrition and ingredients, so it should run first.
pub struct OpenFoodFactsPlugin {
    settings: OpenFoodFactsSettings,
    http: JsonHttpClient,
}

impl Default for OpenFoodFactsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenFoodFactsPlugin {
    pub fn new() -> Self {
        Self {
            settings: OpenFoodFactsSettings::default(),
            http: JsonHttpClient::default(),
        }
    }

    pub fn settings(&self) -> &OpenFoodFactsSettings {
        &self.settings
    }

    /// Barcode forms worth asking for: the digits as given, then the EAN-13
    /// form, since the database indexes US products both ways.
    fn barcode_candidates(query: &str) -> Vec<String> {
        let digits = normalize_digits(query);
        let mut candidates = vec![digits.clone()];
        for variant in generate_variants(&digits) {
            if variant.format == BarcodeFormat::Ean13 && variant.barcode != digits {
                candidates.push(variant.barcode);
            }
        }
        candidates.retain(|c| !c.is_empty());
        candidates
    }

    async fn lookup_barcode(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        for barcode in Self::barcode_candidates(query) {
            let url = format!(
                "{}/api/v2/product/{}.json",
                self.settings.base_url.trim_end_matches('/'),
                barcode
            );
            let Some(body) = self.http.get_json(&url, &[], cancel).await? else {
                debug!(barcode = %barcode, "Product not found");
                continue;
            };
            if body["status"].as_i64() == Some(0) {
                debug!(barcode = %barcode, "Product not found");
                continue;
            }
            if let Some(result) = parse_product(&body["product"]) {
                return Ok(vec![result]);
            }
        }
        Ok(Vec::new())
    }

    async fn search_name(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        let url = format!(
            "{}/cgi/search.pl",
            self.settings.base_url.trim_end_matches('/')
        );
        let params = [
            ("search_terms", query.to_string()),
            ("search_simple", "1".to_string()),
            ("action", "process".to_string()),
            ("json", "1".to_string()),
            ("page_size", max_results.max(1).to_string()),
        ];
        let Some(body) = self.http.get_json(&url, &params, cancel).await? else {
            return Ok(Vec::new());
        };
        Ok(parse_search_response(&body, max_results))
    }
}

#[async_trait]
impl Plugin for OpenFoodFactsPlugin {
    fn plugin_id(&self) -> &str {
        OPEN_FOOD_FACTS_PLUGIN
    }

    fn display_name(&self) -> &str {
        "Open Food Facts"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&mut self, config: &Value) -> PluginResult<()> {
        if !config.is_null() {
            self.settings = serde_json::from_value(config.clone())
                .map_err(|e| PluginError::InvalidConfig(e.to_string()))?;
        }
        if self.settings.base_url.trim().is_empty() {
            return Err(PluginError::InvalidConfig("baseUrl must not be empty".into()));
        }
        self.http = JsonHttpClient::new(&self.settings.user_agent, self.settings.timeout_seconds);
        Ok(())
    }
}

#[async_trait]
impl ProductLookupPlugin for OpenFoodFactsPlugin {
    fn mode(&self) -> PluginMode {
        PluginMode::Source
    }

    #[instrument(skip(self, cancel))]
    async fn lookup(
        &self,
        query: &str,
        search_type: SearchType,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        let results = match search_type {
            SearchType::Barcode => self.lookup_barcode(query, cancel).await?,
            SearchType::Name => self.search_name(query, max_results, cancel).await?,
        };
        info!(
            "Successfully fetched {} products from Open Food Facts",
            results.len()
        );
        Ok(results)
    }
}

/// Map a search response body to results, keeping at most `max_results`.
pub fn parse_search_response(body: &Value, max_results: usize) -> Vec<ProductLookupResult> {
    body["products"]
        .as_array()
        .map(|products| {
            products
                .iter()
                .filter_map(parse_product)
                .take(max_results)
                .collect()
        })
        .unwrap_or_default()
}

/// Map one Open Food Facts product object. Products without a code are skipped.
pub fn parse_product(product: &Value) -> Option<ProductLookupResult> {
    let code = non_empty(product["code"].as_str())?;

    let mut result = ProductLookupResult::from_source(OPEN_FOOD_FACTS_PLUGIN, &code);
    result.barcode = Some(code);
    result.name = non_empty(product["product_name"].as_str())
        .or_else(|| non_empty(product["generic_name"].as_str()));
    // "brands" is a comma separated list; the first one is the primary brand
    result.brand_name = product["brands"]
        .as_str()
        .and_then(|brands| non_empty(brands.split(',').next()));
    result.brand_owner = non_empty(product["brand_owner"].as_str());
    result.ingredients = non_empty(product["ingredients_text"].as_str());
    result.serving_size_description = non_empty(product["serving_size"].as_str());
    result.product_url = non_empty(product["url"].as_str());
    result.image_url = non_empty(product["image_url"].as_str())
        .or_else(|| non_empty(product["image_front_url"].as_str()))
        .map(|url| AttributedUrl::new(url, OPEN_FOOD_FACTS_PLUGIN));
    result.thumbnail_url = non_empty(product["image_thumb_url"].as_str())
        .or_else(|| non_empty(product["image_front_thumb_url"].as_str()))
        .map(|url| AttributedUrl::new(url, OPEN_FOOD_FACTS_PLUGIN));

    if let Some(categories) = product["categories"].as_str() {
        for category in categories.split(',') {
            result.add_category(category);
        }
    }

    let nutrition = parse_nutriments(&product["nutriments"]);
    if !nutrition.is_empty() {
        result.nutrition = Some(nutrition);
    }

    if let Some(grade) = non_empty(product["nutriscore_grade"].as_str()) {
        result
            .additional_data
            .insert("nutriscoreGrade".to_string(), Value::String(grade));
    }
    if let Some(nova) = product["nova_group"].as_i64() {
        result
            .additional_data
            .insert("novaGroup".to_string(), Value::from(nova));
    }

    Some(result)
}

fn parse_nutriments(nutriments: &Value) -> NutritionFacts {
    // Values are sometimes strings in older records
    let number = |key: &str| -> Option<f64> {
        match &nutriments[key] {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    };

    let mut facts = NutritionFacts {
        basis: None,
        energy_kcal: number("energy-kcal_100g"),
        fat: number("fat_100g"),
        saturated_fat: number("saturated-fat_100g"),
        carbohydrates: number("carbohydrates_100g"),
        sugars: number("sugars_100g"),
        fiber: number("fiber_100g"),
        protein: number("proteins_100g"),
        salt: number("salt_100g"),
        sodium: number("sodium_100g"),
    };
    if !facts.is_empty() {
        facts.basis = Some("100g".to_string());
    }
    facts
}
