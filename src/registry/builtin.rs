use crate::constants::{OPEN_FOOD_FACTS_PLUGIN, STATIC_PRICES_PLUGIN, UPCITEMDB_PLUGIN};
use crate::plugins::{OpenFoodFactsPlugin, ProductLookupPlugin, StaticPriceListPlugin, UpcItemDbPlugin};
use crate::registry::plugin_config::PluginConfigEntry;
use std::sync::Arc;

pub type PluginConstructor = Arc<dyn Fn() -> Box<dyn ProductLookupPlugin> + Send + Sync>;

/// A plugin compiled into the binary.
#[derive(Clone)]
pub struct BuiltinPlugin {
    pub id: &'static str,
    pub display_name: &'static str,
    constructor: PluginConstructor,
}

impl BuiltinPlugin {
    pub fn create(&self) -> Box<dyn ProductLookupPlugin> {
        (self.constructor)()
    }
}

/// Ordered table of built-in plugins. Registration order is the order used
/// when no configuration file exists.
#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    plugins: Vec<BuiltinPlugin>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in lookup plugins: authoritative sources first.
    pub fn lookup_defaults() -> Self {
        Self::new()
            .register(OPEN_FOOD_FACTS_PLUGIN, "Open Food Facts", || {
                Box::new(OpenFoodFactsPlugin::new())
            })
            .register(UPCITEMDB_PLUGIN, "UPCitemdb", || Box::new(UpcItemDbPlugin::new()))
    }

    /// Built-in store integration plugins.
    pub fn store_defaults() -> Self {
        Self::new().register(STATIC_PRICES_PLUGIN, "Static price list", || {
            Box::new(StaticPriceListPlugin::new())
        })
    }

    /// Append a plugin. A later registration under an existing id replaces
    /// the constructor but keeps the original position.
    pub fn register<F>(mut self, id: &'static str, display_name: &'static str, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn ProductLookupPlugin> + Send + Sync + 'static,
    {
        let plugin = BuiltinPlugin {
            id,
            display_name,
            constructor: Arc::new(constructor),
        };
        match self.plugins.iter_mut().find(|p| p.id == id) {
            Some(existing) => *existing = plugin,
            None => self.plugins.push(plugin),
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&BuiltinPlugin> {
        self.plugins.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Descriptors enabling every built-in with no configuration.
    pub fn default_entries(&self) -> Vec<PluginConfigEntry> {
        self.plugins
            .iter()
            .map(|p| PluginConfigEntry::builtin(p.id, p.display_name))
            .collect()
    }
}
