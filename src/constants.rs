/// Plugin id constants shared by the built-in registry, plugins and CLI.
/// Each id doubles as the plugin's key in `dataSources`.

// Built-in lookup plugins, in registration order
pub const OPEN_FOOD_FACTS_PLUGIN: &str = "openfoodfacts";
pub const UPCITEMDB_PLUGIN: &str = "upcitemdb";

// Built-in store plugins
pub const STATIC_PRICES_PLUGIN: &str = "static_prices";

// Defaults used when config.toml is absent or partial
pub const DEFAULT_MAX_RESULTS: usize = 20;
pub const DEFAULT_PLUGIN_CONFIG_PATH: &str = "plugins.json";
pub const DEFAULT_APP_CONFIG_PATH: &str = "config.toml";
pub const APP_CONFIG_ENV_VAR: &str = "PRODUCT_LOOKUP_CONFIG";

/// Get all built-in lookup plugin ids in registration order
pub fn get_builtin_lookup_plugins() -> Vec<&'static str> {
    vec![OPEN_FOOD_FACTS_PLUGIN, UPCITEMDB_PLUGIN]
}

/// Get all built-in store plugin ids in registration order
pub fn get_builtin_store_plugins() -> Vec<&'static str> {
    vec![STATIC_PRICES_PLUGIN]
}
