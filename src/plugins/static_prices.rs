use crate::barcode::{generate_variants, normalize_digits, BarcodeVariant};
use crate::constants::STATIC_PRICES_PLUGIN;
use crate::error::{PluginError, PluginResult};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::merge::merge_into;
use crate::plugins::{Plugin, PluginMode, ProductLookupPlugin};
use crate::types::{PriceQuote, ProductLookupResult, SearchType};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PriceEntry {
    Amount(f64),
    Detailed {
        price: f64,
        #[serde(default)]
        currency: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StaticPriceSettings {
    #[serde(default = "default_store")]
    store: String,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    prices: BTreeMap<String, PriceEntry>,
}

fn default_store() -> String {
    "Local price list".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

struct PricedBarcode {
    digits: String,
    variants: BTreeSet<BarcodeVariant>,
    quote: PriceQuote,
}

impl PricedBarcode {
    fn matches(&self, barcode: &str) -> bool {
        let digits = normalize_digits(barcode);
        if digits.is_empty() {
            return false;
        }
        digits == self.digits || !self.variants.is_disjoint(&generate_variants(&digits))
    }
}

/// Store plugin that prices products from a price list in its own config.
///
/// ```json
/// { "store": "Corner Shop", "currency": "USD",
///   "prices": { "761720051108": 1.29, "96385074": { "price": 0.99, "url": "https://..." } } }
/// ```
///
/// Only existing results are priced; the list never creates new products.
#[derive(Default)]
pub struct StaticPriceListPlugin {
    store: String,
    entries: Vec<PricedBarcode>,
}

impl StaticPriceListPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn quote_for(&self, barcode: &str) -> Option<&PriceQuote> {
        self.entries
            .iter()
            .find(|entry| entry.matches(barcode))
            .map(|entry| &entry.quote)
    }
}

#[async_trait]
impl Plugin for StaticPriceListPlugin {
    fn plugin_id(&self) -> &str {
        STATIC_PRICES_PLUGIN
    }

    fn display_name(&self) -> &str {
        "Static price list"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn is_available(&self) -> bool {
        !self.entries.is_empty()
    }

    async fn init(&mut self, config: &Value) -> PluginResult<()> {
        if config.is_null() {
            self.store = default_store();
            self.entries.clear();
            return Ok(());
        }
        let settings: StaticPriceSettings = serde_json::from_value(config.clone())
            .map_err(|e| PluginError::InvalidConfig(e.to_string()))?;

        let mut entries = Vec::with_capacity(settings.prices.len());
        for (barcode, entry) in settings.prices {
            let digits = normalize_digits(&barcode);
            if digits.is_empty() {
                return Err(PluginError::InvalidConfig(format!(
                    "price list key '{}' is not a barcode",
                    barcode
                )));
            }
            let (price, currency, url) = match entry {
                PriceEntry::Amount(price) => (price, None, None),
                PriceEntry::Detailed { price, currency, url } => (price, currency, url),
            };
            entries.push(PricedBarcode {
                variants: generate_variants(&digits),
                digits,
                quote: PriceQuote {
                    store: settings.store.clone(),
                    price,
                    currency: currency.unwrap_or_else(|| settings.currency.clone()),
                    url,
                },
            });
        }
        self.store = settings.store;
        self.entries = entries;
        Ok(())
    }
}

#[async_trait]
impl ProductLookupPlugin for StaticPriceListPlugin {
    fn mode(&self) -> PluginMode {
        PluginMode::Enrichment
    }

    async fn lookup(
        &self,
        query: &str,
        search_type: SearchType,
        _max_results: usize,
        _cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        if search_type != SearchType::Barcode {
            return Ok(Vec::new());
        }
        Ok(self
            .quote_for(query)
            .map(|quote| {
                let digits = normalize_digits(query);
                let mut result = ProductLookupResult::from_source(STATIC_PRICES_PLUGIN, &digits)
                    .with_barcode(digits);
                result.prices.push(quote.clone());
                result
            })
            .into_iter()
            .collect())
    }

    async fn process_pipeline(
        &self,
        context: &mut PipelineContext,
        _cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let mut priced = 0usize;
        for existing in context.results_mut() {
            let Some(barcode) = existing.barcode.clone() else {
                continue;
            };
            if let Some(quote) = self.quote_for(&barcode) {
                let mut update = ProductLookupResult::from_source(STATIC_PRICES_PLUGIN, &barcode);
                update.prices.push(quote.clone());
                merge_into(existing, update);
                priced += 1;
            }
        }
        debug!(store = %self.store, priced, "Applied static prices");
        Ok(())
    }
}
