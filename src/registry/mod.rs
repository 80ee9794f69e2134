//! Plugin configuration, resolution and the swappable plugin snapshot.

pub mod builtin;
pub mod loader;
pub mod plugin_config;
pub mod provider;

pub use builtin::{BuiltinPlugin, BuiltinRegistry};
pub use loader::{ActivePlugin, ConfigSource, PluginLoader, PluginSnapshot};
pub use plugin_config::{PluginConfigDocument, PluginConfigEntry};
pub use provider::PluginProvider;
