use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{error, warn};

/// One plugin descriptor. Array order in the document is execution order.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfigEntry {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub builtin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(default)]
    pub display_name: String,
    /// Passed verbatim to the plugin's `init`.
    #[serde(default)]
    pub config: Value,
}

fn default_true() -> bool {
    true
}

impl PluginConfigEntry {
    /// An enabled built-in descriptor with no configuration.
    pub fn builtin(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            builtin: true,
            module_path: None,
            display_name: display_name.into(),
            config: Value::Null,
        }
    }

    /// An enabled external descriptor resolved from `module_path`.
    pub fn external(id: impl Into<String>, module_path: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            enabled: true,
            builtin: false,
            module_path: Some(module_path.into()),
            config: Value::Null,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn validate(mut self, index: usize) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidDescriptor {
            index,
            message: message.to_string(),
        };
        self.id = self.id.trim().to_string();
        if self.id.is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if !self.builtin
            && self
                .module_path
                .as_deref()
                .map_or(true, |p| p.trim().is_empty())
        {
            return Err(invalid("external plugins need a modulePath"));
        }
        if self.display_name.trim().is_empty() {
            self.display_name = self.id.clone();
        }
        Ok(self)
    }
}

/// The parsed plugin configuration document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PluginConfigDocument {
    pub plugins: Vec<PluginConfigEntry>,
    pub store_plugins: Vec<PluginConfigEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    #[serde(default)]
    plugins: Vec<Value>,
    #[serde(default)]
    store_plugins: Vec<Value>,
}

impl PluginConfigDocument {
    /// Load the document at `path`. `Ok(None)` when no file exists.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content).map(Some)
    }

    /// Parse a document. Only a malformed top level fails; a malformed
    /// descriptor is logged and skipped.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawDocument = serde_json::from_str(content)?;
        Ok(Self {
            plugins: parse_entries("plugins", raw.plugins),
            store_plugins: parse_entries("storePlugins", raw.store_plugins),
        })
    }
}

fn parse_entries(section: &str, values: Vec<Value>) -> Vec<PluginConfigEntry> {
    let mut entries: Vec<PluginConfigEntry> = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let parsed = serde_json::from_value::<PluginConfigEntry>(value)
            .map_err(|e| ConfigError::InvalidDescriptor {
                index,
                message: e.to_string(),
            })
            .and_then(|entry| entry.validate(index));

        match parsed {
            Ok(entry) => {
                if entries.iter().any(|existing| existing.id == entry.id) {
                    warn!(section, index, id = %entry.id, "Duplicate plugin id, later descriptor ignored");
                    continue;
                }
                entries.push(entry);
            }
            Err(e) => {
                error!(section, "Skipping plugin descriptor: {}", e);
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_array_order_and_defaults() {
        let doc = PluginConfigDocument::parse(
            r#"{
                "plugins": [
                    {"id": "upcitemdb"},
                    {"id": "openfoodfacts", "displayName": "OFF", "config": {"timeoutSeconds": 3}},
                    {"id": "catalog", "builtin": false, "modulePath": "/opt/catalog", "enabled": false}
                ]
            }"#,
        )
        .unwrap();

        let ids: Vec<&str> = doc.plugins.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["upcitemdb", "openfoodfacts", "catalog"]);
        assert!(doc.plugins[0].enabled);
        assert!(doc.plugins[0].builtin);
        assert_eq!(doc.plugins[0].display_name, "upcitemdb");
        assert_eq!(doc.plugins[1].config, json!({"timeoutSeconds": 3}));
        assert!(!doc.plugins[2].enabled);
        assert!(doc.store_plugins.is_empty());
    }

    #[test]
    fn test_malformed_descriptors_are_skipped() {
        let doc = PluginConfigDocument::parse(
            r#"{
                "plugins": [
                    {"id": 42},
                    {"enabled": true},
                    {"id": "  "},
                    {"id": "external", "builtin": false},
                    {"id": "openfoodfacts"},
                    {"id": "openfoodfacts", "enabled": false}
                ],
                "storePlugins": [{"id": "static_prices", "config": {"prices": {}}}]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.plugins.len(), 1);
        assert_eq!(doc.plugins[0].id, "openfoodfacts");
        assert!(doc.plugins[0].enabled);
        assert_eq!(doc.store_plugins.len(), 1);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(PluginConfigDocument::parse("[not json").is_err());
        assert!(PluginConfigDocument::parse(r#"{"plugins": {"id": "x"}}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PluginConfigDocument::load_from_file(dir.path().join("plugins.json")).unwrap();
        assert!(loaded.is_none());
    }
}
