use crate::error::PluginLoadError;
use crate::metrics::PluginMetrics;
use crate::plugins::{ExternalPluginFactory, Plugin, ProcessPluginFactory, ProductLookupPlugin};
use crate::registry::builtin::BuiltinRegistry;
use crate::registry::plugin_config::{PluginConfigDocument, PluginConfigEntry};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Where the plugin list of a snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No configuration file: every built-in enabled.
    Defaults,
    /// The file existed but could not be parsed; built-ins were used instead.
    DefaultsAfterError(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
            ConfigSource::DefaultsAfterError(path) => {
                write!(f, "built-in defaults ({} was unreadable)", path.display())
            }
        }
    }
}

/// A plugin that resolved and initialized successfully.
#[derive(Clone)]
pub struct ActivePlugin {
    /// Id of the descriptor that produced this plugin.
    pub config_id: String,
    pub plugin: Arc<dyn ProductLookupPlugin>,
}

impl fmt::Debug for ActivePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivePlugin")
            .field("config_id", &self.config_id)
            .field("plugin_id", &self.plugin.plugin_id())
            .field("mode", &self.plugin.mode())
            .finish()
    }
}

/// Immutable, ordered plugin list used by every query started while it is
/// current.
#[derive(Debug)]
pub struct PluginSnapshot {
    pub lookup_plugins: Vec<ActivePlugin>,
    pub store_plugins: Vec<ActivePlugin>,
    pub configurations: Vec<PluginConfigEntry>,
    pub store_configurations: Vec<PluginConfigEntry>,
    pub source: ConfigSource,
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
}

impl PluginSnapshot {
    pub fn empty() -> Self {
        Self {
            lookup_plugins: Vec::new(),
            store_plugins: Vec::new(),
            configurations: Vec::new(),
            store_configurations: Vec::new(),
            source: ConfigSource::Defaults,
            generation: 0,
            loaded_at: Utc::now(),
        }
    }

    /// Lookup and store plugins that resolved and initialized.
    pub fn active_plugin_count(&self) -> usize {
        self.lookup_plugins.len() + self.store_plugins.len()
    }

    pub fn lookup_plugin_ids(&self) -> Vec<&str> {
        self.lookup_plugins.iter().map(|p| p.plugin.plugin_id()).collect()
    }

    pub fn store_plugin_ids(&self) -> Vec<&str> {
        self.store_plugins.iter().map(|p| p.plugin.plugin_id()).collect()
    }

    /// Lookup plugins followed by store plugins, in execution order.
    pub fn execution_order(&self) -> Vec<Arc<dyn ProductLookupPlugin>> {
        self.lookup_plugins
            .iter()
            .chain(self.store_plugins.iter())
            .map(|p| Arc::clone(&p.plugin))
            .collect()
    }
}

/// Builds plugin snapshots from the configuration document.
///
/// Nothing here fails: bad descriptors, unknown ids and plugins that do not
/// initialize are logged and left out of the snapshot.
pub struct PluginLoader {
    config_path: Option<PathBuf>,
    lookup_builtins: BuiltinRegistry,
    store_builtins: BuiltinRegistry,
    external_factory: Arc<dyn ExternalPluginFactory>,
}

impl PluginLoader {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            lookup_builtins: BuiltinRegistry::lookup_defaults(),
            store_builtins: BuiltinRegistry::store_defaults(),
            external_factory: Arc::new(ProcessPluginFactory::default()),
        }
    }

    pub fn with_lookup_builtins(mut self, builtins: BuiltinRegistry) -> Self {
        self.lookup_builtins = builtins;
        self
    }

    pub fn with_store_builtins(mut self, builtins: BuiltinRegistry) -> Self {
        self.store_builtins = builtins;
        self
    }

    pub fn with_external_factory(mut self, factory: Arc<dyn ExternalPluginFactory>) -> Self {
        self.external_factory = factory;
        self
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    /// Read the configuration file (if any) and build a snapshot from it.
    #[instrument(skip(self))]
    pub async fn load(&self) -> PluginSnapshot {
        let (document, source) = match &self.config_path {
            None => (None, ConfigSource::Defaults),
            Some(path) => match PluginConfigDocument::load_from_file(path) {
                Ok(Some(document)) => (Some(document), ConfigSource::File(path.clone())),
                Ok(None) => {
                    info!(path = %path.display(), "No plugin configuration found, enabling all built-in plugins");
                    (None, ConfigSource::Defaults)
                }
                Err(e) => {
                    error!(path = %path.display(), "Failed to read plugin configuration: {}", e);
                    PluginMetrics::record_config_error();
                    (None, ConfigSource::DefaultsAfterError(path.clone()))
                }
            },
        };
        self.load_document(document, source).await
    }

    /// Build a snapshot from an already parsed document. `None` means zero
    /// configuration: all built-ins, in registration order.
    pub async fn load_document(
        &self,
        document: Option<PluginConfigDocument>,
        source: ConfigSource,
    ) -> PluginSnapshot {
        let document = document.unwrap_or_else(|| PluginConfigDocument {
            plugins: self.lookup_builtins.default_entries(),
            store_plugins: self.store_builtins.default_entries(),
        });

        let lookup_plugins = self
            .instantiate("plugins", &document.plugins, &self.lookup_builtins)
            .await;
        let store_plugins = self
            .instantiate("storePlugins", &document.store_plugins, &self.store_builtins)
            .await;

        info!(
            source = %source,
            lookup_plugins = lookup_plugins.len(),
            store_plugins = store_plugins.len(),
            "Plugin snapshot built"
        );

        PluginSnapshot {
            lookup_plugins,
            store_plugins,
            configurations: document.plugins,
            store_configurations: document.store_plugins,
            source,
            generation: 0,
            loaded_at: Utc::now(),
        }
    }

    async fn instantiate(
        &self,
        section: &str,
        entries: &[PluginConfigEntry],
        builtins: &BuiltinRegistry,
    ) -> Vec<ActivePlugin> {
        let mut active = Vec::new();
        for entry in entries {
            if !entry.enabled {
                info!(section, id = %entry.id, "Plugin disabled, not loading");
                continue;
            }
            match self.resolve_entry(entry, builtins).await {
                Ok(plugin) => {
                    info!(
                        section,
                        id = %entry.id,
                        plugin_id = plugin.plugin_id(),
                        version = plugin.version(),
                        mode = plugin.mode().as_str(),
                        "Loaded plugin"
                    );
                    PluginMetrics::record_load_success();
                    active.push(ActivePlugin {
                        config_id: entry.id.clone(),
                        plugin: Arc::from(plugin),
                    });
                }
                Err(e) => {
                    error!(section, id = %entry.id, "Failed to load plugin: {}", e);
                    PluginMetrics::record_load_error();
                }
            }
        }
        active
    }

    async fn resolve_entry(
        &self,
        entry: &PluginConfigEntry,
        builtins: &BuiltinRegistry,
    ) -> Result<Box<dyn ProductLookupPlugin>, PluginLoadError> {
        let mut plugin = if entry.builtin {
            builtins
                .get(&entry.id)
                .ok_or_else(|| PluginLoadError::UnknownBuiltin(entry.id.clone()))?
                .create()
        } else {
            let module_path = entry.module_path.as_deref().ok_or_else(|| {
                PluginLoadError::ModuleResolution {
                    module_path: String::new(),
                    message: "descriptor has no modulePath".to_string(),
                }
            })?;
            let plugin = self.external_factory.resolve_plugin(module_path).await?;
            if plugin.plugin_id() != entry.id {
                warn!(
                    id = %entry.id,
                    plugin_id = plugin.plugin_id(),
                    "External plugin reports a different id; results are attributed to the plugin's own id"
                );
            }
            plugin
        };

        plugin
            .init(&entry.config)
            .await
            .map_err(|source| PluginLoadError::Init {
                plugin_id: entry.id.clone(),
                source,
            })?;

        if !plugin.is_available() {
            info!(id = %entry.id, "Plugin loaded but currently unavailable");
        }
        Ok(plugin)
    }
}
