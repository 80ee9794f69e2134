use crate::metrics::PluginMetrics;
use crate::registry::loader::{PluginLoader, PluginSnapshot};
use crate::registry::plugin_config::PluginConfigEntry;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Holds the current plugin snapshot.
///
/// Readers clone the `Arc` and never block on a reload: `reload` builds a
/// complete new snapshot first and only then swaps the reference, so queries
/// already running keep the snapshot they started with.
pub struct PluginProvider {
    loader: PluginLoader,
    current: RwLock<Arc<PluginSnapshot>>,
    reload_lock: tokio::sync::Mutex<u64>,
}

impl PluginProvider {
    /// Load the initial snapshot.
    pub async fn start(loader: PluginLoader) -> Self {
        let mut snapshot = loader.load().await;
        snapshot.generation = 1;
        PluginMetrics::set_active_plugins(snapshot.active_plugin_count());
        Self {
            loader,
            current: RwLock::new(Arc::new(snapshot)),
            reload_lock: tokio::sync::Mutex::new(1),
        }
    }

    pub fn snapshot(&self) -> Arc<PluginSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Rebuild the snapshot from configuration and swap it in.
    pub async fn reload(&self) -> Arc<PluginSnapshot> {
        let mut generation = self.reload_lock.lock().await;
        let mut snapshot = self.loader.load().await;
        *generation += 1;
        snapshot.generation = *generation;
        let snapshot = Arc::new(snapshot);

        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = Arc::clone(&snapshot);
        }
        PluginMetrics::set_active_plugins(snapshot.active_plugin_count());
        info!(
            generation = snapshot.generation,
            lookup_plugins = snapshot.lookup_plugins.len(),
            store_plugins = snapshot.store_plugins.len(),
            "Plugin snapshot reloaded"
        );
        snapshot
    }

    /// Every lookup descriptor, including disabled and unresolvable ones.
    pub fn get_plugin_configurations(&self) -> Vec<PluginConfigEntry> {
        self.snapshot().configurations.clone()
    }

    /// Every store descriptor, including disabled and unresolvable ones.
    pub fn get_store_plugin_configurations(&self) -> Vec<PluginConfigEntry> {
        self.snapshot().store_configurations.clone()
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }
}
