use thiserror::Error;

/// Raised when a check digit cannot be computed from the given core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarcodeError {
    #[error("check digit core must have at least {min} digits, got {len}")]
    CoreTooShort { len: usize, min: usize },

    #[error("check digit core contains a non-digit character: {0:?}")]
    NonDigit(char),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid plugin descriptor at index {index}: {message}")]
    InvalidDescriptor { index: usize, message: String },
}

#[derive(Error, Debug)]
pub enum PluginLoadError {
    #[error("No built-in plugin registered with id '{0}'")]
    UnknownBuiltin(String),

    #[error("Failed to resolve plugin module '{module_path}': {message}")]
    ModuleResolution { module_path: String, message: String },

    #[error("Plugin '{plugin_id}' failed to initialize: {source}")]
    Init {
        plugin_id: String,
        #[source]
        source: PluginError,
    },
}

/// Anything a plugin can fail with while initializing, looking up or enriching.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Plugin protocol error: {0}")]
    Protocol(String),

    #[error("Invalid plugin configuration: {0}")]
    InvalidConfig(String),

    #[error("Plugin is not available: {0}")]
    Unavailable(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl PluginError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PluginError::Cancelled)
    }
}

pub type PluginResult<T> = std::result::Result<T, PluginError>;
