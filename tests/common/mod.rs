#![allow(dead_code)]

use async_trait::async_trait;
use product_lookup::error::{PluginError, PluginResult};
use product_lookup::plugins::{Plugin, PluginMode, ProductLookupPlugin};
use product_lookup::types::{ProductLookupResult, SearchType};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source-mode plugin answering every query with one canned product.
pub struct CannedSource {
    pub id: &'static str,
    pub barcode: &'static str,
    pub name: &'static str,
    pub brand: Option<String>,
    pub fail_with: Option<&'static str>,
    pub calls: Arc<AtomicUsize>,
}

impl CannedSource {
    pub fn new(id: &'static str, barcode: &'static str, name: &'static str) -> Self {
        Self {
            id,
            barcode,
            name,
            brand: None,
            fail_with: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(id: &'static str, message: &'static str) -> Self {
        Self {
            fail_with: Some(message),
            ..Self::new(id, "", "")
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Plugin for CannedSource {
    fn plugin_id(&self) -> &str {
        self.id
    }

    fn display_name(&self) -> &str {
        self.id
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn init(&mut self, config: &Value) -> PluginResult<()> {
        if let Some(brand) = config.get("brand").and_then(Value::as_str) {
            self.brand = Some(brand.to_string());
        }
        if config.get("reject").and_then(Value::as_bool) == Some(true) {
            return Err(PluginError::InvalidConfig("rejected by test".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductLookupPlugin for CannedSource {
    async fn lookup(
        &self,
        _query: &str,
        _search_type: SearchType,
        _max_results: usize,
        _cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_with {
            return Err(PluginError::Api {
                message: message.to_string(),
            });
        }
        let mut result = ProductLookupResult::from_source(self.id, format!("{}-1", self.id))
            .with_barcode(self.barcode)
            .with_name(self.name);
        result.brand_name = self.brand.clone();
        result.add_category(self.id);
        Ok(vec![result])
    }
}

/// Enrichment-mode plugin relying on the default merge behavior.
pub struct CannedEnricher {
    pub id: &'static str,
    pub barcode: &'static str,
    pub brand: &'static str,
}

#[async_trait]
impl Plugin for CannedEnricher {
    fn plugin_id(&self) -> &str {
        self.id
    }

    fn display_name(&self) -> &str {
        self.id
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn init(&mut self, _config: &Value) -> PluginResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ProductLookupPlugin for CannedEnricher {
    fn mode(&self) -> PluginMode {
        PluginMode::Enrichment
    }

    async fn lookup(
        &self,
        _query: &str,
        _search_type: SearchType,
        _max_results: usize,
        _cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        Ok(vec![ProductLookupResult::from_source(self.id, "enriched")
            .with_barcode(self.barcode)
            .with_brand(self.brand)])
    }
}

pub fn arc<P: ProductLookupPlugin + 'static>(plugin: P) -> Arc<dyn ProductLookupPlugin> {
    Arc::new(plugin)
}
