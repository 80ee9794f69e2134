use crate::constants::UPCITEMDB_PLUGIN;
use crate::error::{PluginError, PluginResult};
use crate::plugins::http::{JsonHttpClient, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::plugins::{Plugin, PluginMode, ProductLookupPlugin};
use crate::types::{non_empty, AttributedUrl, PriceQuote, ProductLookupResult, SearchType};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

const TRIAL_PATH: &str = "/prod/trial";
const KEYED_PATH: &str = "/prod/v1";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpcItemDbSettings {
    pub base_url: String,
    /// Without a key the rate-limited trial endpoint is used.
    pub api_key: Option<String>,
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Currency assumed for offers that do not state one.
    pub default_currency: String,
}

impl Default for UpcItemDbSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.upcitemdb.com".to_string(),
            api_key: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            default_currency: "USD".to_string(),
        }
    }
}

/// Enrichment-mode plugin for the UPCitemdb catalog. Fills images, brand and
/// offers on results an earlier source already found.
pub struct UpcItemDbPlugin {
    settings: UpcItemDbSettings,
    http: JsonHttpClient,
}

impl Default for UpcItemDbPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl UpcItemDbPlugin {
    pub fn new() -> Self {
        Self {
            settings: UpcItemDbSettings::default(),
            http: JsonHttpClient::default(),
        }
    }

    fn endpoint(&self, operation: &str) -> String {
        let path = if self.settings.api_key.is_some() {
            KEYED_PATH
        } else {
            TRIAL_PATH
        };
        format!(
            "{}{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            path,
            operation
        )
    }
}

#[async_trait]
impl Plugin for UpcItemDbPlugin {
    fn plugin_id(&self) -> &str {
        UPCITEMDB_PLUGIN
    }

    fn display_name(&self) -> &str {
        "UPCitemdb"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&mut self, config: &Value) -> PluginResult<()> {
        if !config.is_null() {
            self.settings = serde_json::from_value(config.clone())
                .map_err(|e| PluginError::InvalidConfig(e.to_string()))?;
        }
        let mut http = JsonHttpClient::new(&self.settings.user_agent, self.settings.timeout_seconds);
        if let Some(key) = &self.settings.api_key {
            if key.trim().is_empty() {
                return Err(PluginError::InvalidConfig("apiKey must not be empty".into()));
            }
            http = http
                .with_header("user_key", key.as_str())
                .with_header("key_type", "3scale");
        }
        self.http = http;
        Ok(())
    }
}

#[async_trait]
impl ProductLookupPlugin for UpcItemDbPlugin {
    fn mode(&self) -> PluginMode {
        PluginMode::Enrichment
    }

    #[instrument(skip(self, cancel))]
    async fn lookup(
        &self,
        query: &str,
        search_type: SearchType,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        let body = match search_type {
            SearchType::Barcode => {
                self.http
                    .get_json(&self.endpoint("lookup"), &[("upc", lookup_code(query))], cancel)
                    .await?
            }
            SearchType::Name => {
                let params = [
                    ("s", query.to_string()),
                    ("match_mode", "0".to_string()),
                    ("type", "product".to_string()),
                ];
                self.http
                    .get_json(&self.endpoint("search"), &params, cancel)
                    .await?
            }
        };

        let Some(body) = body else {
            return Ok(Vec::new());
        };
        let results = parse_response(&body, &self.settings.default_currency, max_results)?;
        info!("Successfully fetched {} items from UPCitemdb", results.len());
        Ok(results)
    }
}

/// UPCitemdb indexes UPC-A codes; send the UPC-A form when the barcode has
/// one, otherwise its digits as typed.
pub fn lookup_code(query: &str) -> String {
    let digits = crate::barcode::normalize_digits(query);
    crate::barcode::generate_variants(&digits)
        .into_iter()
        .find(|variant| variant.format == crate::barcode::BarcodeFormat::UpcA)
        .map(|variant| variant.barcode)
        .unwrap_or(digits)
}

/// Check the response `code` and map its items.
pub fn parse_response(
    body: &Value,
    default_currency: &str,
    max_results: usize,
) -> PluginResult<Vec<ProductLookupResult>> {
    if let Some(code) = body["code"].as_str() {
        if code != "OK" {
            return Err(PluginError::Api {
                message: format!(
                    "UPCitemdb returned {}: {}",
                    code,
                    body["message"].as_str().unwrap_or("no message")
                ),
            });
        }
    }
    Ok(parse_items(body, default_currency, max_results))
}

/// Map the `items` array of a lookup or search response.
pub fn parse_items(body: &Value, default_currency: &str, max_results: usize) -> Vec<ProductLookupResult> {
    body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| parse_item(item, default_currency))
                .take(max_results)
                .collect()
        })
        .unwrap_or_default()
}

/// Map one item. Items with neither an EAN nor a UPC are skipped.
pub fn parse_item(item: &Value, default_currency: &str) -> Option<ProductLookupResult> {
    let barcode = non_empty(item["upc"].as_str()).or_else(|| non_empty(item["ean"].as_str()))?;

    let mut result = ProductLookupResult::from_source(UPCITEMDB_PLUGIN, &barcode);
    result.barcode = Some(barcode);
    result.name = non_empty(item["title"].as_str());
    result.brand_name = non_empty(item["brand"].as_str());

    if let Some(category) = item["category"].as_str() {
        // "Food, Beverages & Tobacco > Food Items > Snack Foods"
        for part in category.split('>') {
            result.add_category(part);
        }
    }

    let images: Vec<&str> = item["images"]
        .as_array()
        .map(|images| {
            images
                .iter()
                .filter_map(Value::as_str)
                .filter(|url| !url.trim().is_empty())
                .collect()
        })
        .unwrap_or_default();
    if let Some(first) = images.first() {
        result.image_url = Some(AttributedUrl::new(*first, UPCITEMDB_PLUGIN));
        result.thumbnail_url = Some(AttributedUrl::new(*first, UPCITEMDB_PLUGIN));
    }

    if let Some(offers) = item["offers"].as_array() {
        for offer in offers {
            let (Some(store), Some(price)) = (non_empty(offer["merchant"].as_str()), offer["price"].as_f64()) else {
                continue;
            };
            if price <= 0.0 {
                continue;
            }
            let currency = non_empty(offer["currency"].as_str())
                .unwrap_or_else(|| default_currency.to_string());
            let quote = PriceQuote {
                store,
                price,
                currency,
                url: non_empty(offer["link"].as_str()),
            };
            let store = quote.store.to_lowercase();
            if !result.prices.iter().any(|p| p.store.to_lowercase() == store) {
                result.prices.push(quote);
            }
        }
    }

    if let Some(description) = non_empty(item["description"].as_str()) {
        result
            .additional_data
            .insert("description".to_string(), Value::String(description));
    }
    if let Some(model) = non_empty(item["model"].as_str()) {
        result
            .additional_data
            .insert("model".to_string(), Value::String(model));
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineContext;
    use serde_json::json;

    fn lookup_body() -> Value {
        json!({
            "code": "OK",
            "total": 1,
            "items": [{
                "ean": "0761720051108",
                "upc": "761720051108",
                "title": "Cola Classic 12oz",
                "brand": "Fizz Co",
                "category": "Food, Beverages & Tobacco > Beverages > Soda",
                "description": "Classic cola",
                "images": ["https://img.example/cola.jpg", ""],
                "offers": [
                    {"merchant": "Corner Shop", "price": 1.29, "currency": "", "link": "https://shop.example/cola"},
                    {"merchant": "corner shop", "price": 1.19},
                    {"merchant": "Mega Mart", "price": 0}
                ]
            }, {
                "title": "No barcode"
            }]
        })
    }

    #[test]
    fn test_plugin_identity() {
        let plugin = UpcItemDbPlugin::new();
        assert_eq!(plugin.plugin_id(), "upcitemdb");
        assert_eq!(plugin.mode(), PluginMode::Enrichment);
    }

    #[test]
    fn test_parse_items() {
        let results = parse_items(&lookup_body(), "USD", 10);
        assert_eq!(results.len(), 1);

        let cola = &results[0];
        assert_eq!(cola.barcode.as_deref(), Some("761720051108"));
        assert_eq!(cola.name.as_deref(), Some("Cola Classic 12oz"));
        assert_eq!(cola.categories, vec!["Food, Beverages & Tobacco", "Beverages", "Soda"]);
        assert_eq!(cola.image_url.as_ref().unwrap().url, "https://img.example/cola.jpg");
        assert_eq!(cola.prices.len(), 1);
        assert_eq!(cola.prices[0].currency, "USD");
        assert_eq!(cola.additional_data["description"], json!("Classic cola"));
    }

    #[tokio::test]
    async fn test_endpoint_switches_with_api_key() {
        let mut plugin = UpcItemDbPlugin::new();
        assert_eq!(plugin.endpoint("lookup"), "https://api.upcitemdb.com/prod/trial/lookup");

        plugin
            .init(&json!({"apiKey": "secret", "baseUrl": "http://localhost:8080/"}))
            .await
            .unwrap();
        assert_eq!(plugin.endpoint("search"), "http://localhost:8080/prod/v1/search");
    }

    #[tokio::test]
    async fn test_init_rejects_blank_api_key() {
        let mut plugin = UpcItemDbPlugin::new();
        assert!(plugin.init(&json!({"apiKey": " "})).await.is_err());
    }

    #[test]
    fn test_lookup_code_prefers_upc_a() {
        assert_eq!(lookup_code("76172005110"), "761720051108");
        assert_eq!(lookup_code("0761720051108"), "761720051108");
        assert_eq!(lookup_code("761720051108"), "761720051108");
        assert_eq!(lookup_code("96385074"), "96385074");
        assert_eq!(lookup_code("4006381333931"), "4006381333931");
    }

    #[test]
    fn test_parse_response_rejects_error_code() {
        let body = json!({"code": "INVALID_UPC", "message": "Not a valid UPC code."});
        let err = parse_response(&body, "USD", 10).unwrap_err();
        assert!(err.to_string().contains("INVALID_UPC"));
    }

    #[test]
    fn test_enrich_pipeline_merges_into_existing_result() {
        let plugin = UpcItemDbPlugin::new();
        let mut context = PipelineContext::new("0761720051108", SearchType::Barcode, 10);
        context.add_result(
            ProductLookupResult::from_source("openfoodfacts", "0761720051108")
                .with_barcode("0761720051108")
                .with_name("Cola"),
        );

        let items = parse_response(&lookup_body(), "USD", 10).unwrap();
        plugin.enrich_pipeline(&mut context, items);

        assert_eq!(context.len(), 1);
        let cola = &context.results()[0];
        assert!(cola.has_source("openfoodfacts"));
        assert!(cola.has_source("upcitemdb"));
        assert_eq!(cola.name.as_deref(), Some("Cola"));
        assert_eq!(cola.brand_name.as_deref(), Some("Fizz Co"));
        assert_eq!(cola.prices.len(), 1);
    }

    /// Answer one HTTP request with `body` and hand back its request line.
    async fn serve_once(body: Value) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let payload = body.to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                payload.len(),
                payload
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let request = String::from_utf8_lossy(&request).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base_url, handle)
    }

    #[tokio::test]
    async fn test_process_pipeline_enriches_over_http() {
        let (base_url, request_line) = serve_once(lookup_body()).await;
        let mut plugin = UpcItemDbPlugin::new();
        plugin.init(&json!({"baseUrl": base_url})).await.unwrap();

        let mut context = PipelineContext::new("76172005110", SearchType::Barcode, 10);
        context.add_result(
            ProductLookupResult::from_source("openfoodfacts", "0761720051108")
                .with_barcode("0761720051108")
                .with_name("Cola"),
        );

        plugin
            .process_pipeline(&mut context, &CancellationToken::new())
            .await
            .unwrap();

        let request_line = request_line.await.unwrap();
        assert!(request_line.starts_with("GET /prod/trial/lookup?upc=761720051108 "));
        assert_eq!(context.len(), 1);
        assert!(context.results()[0].has_source("upcitemdb"));
        assert_eq!(context.results()[0].prices[0].store, "Corner Shop");
    }
}
