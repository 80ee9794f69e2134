//! Plugins that live outside the binary.
//!
//! An external plugin is an executable speaking JSON over stdin/stdout:
//!
//! - `<module> describe` prints `{"pluginId", "displayName", "version", "mode"}`.
//! - `<module> lookup` reads `{"query", "searchType", "maxResults", "config"}`
//!   from stdin and prints a JSON array of product results.
//!
//! The process is killed when the lookup is cancelled or times out.

use crate::error::{PluginError, PluginLoadError, PluginResult};
use crate::plugins::{Plugin, PluginMode, ProductLookupPlugin};
use crate::types::{ProductLookupResult, SearchType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Resolves a descriptor's `modulePath` into a runnable plugin instance.
#[async_trait]
pub trait ExternalPluginFactory: Send + Sync {
    async fn resolve_plugin(
        &self,
        module_path: &str,
    ) -> Result<Box<dyn ProductLookupPlugin>, PluginLoadError>;
}

/// Handshake answer of an external plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescription {
    pub plugin_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: PluginMode,
}

fn default_mode() -> PluginMode {
    PluginMode::Source
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    query: &'a str,
    search_type: SearchType,
    max_results: usize,
    config: &'a Value,
}

/// Runs external plugins as child processes.
#[derive(Debug, Clone)]
pub struct ProcessPluginFactory {
    handshake_timeout: Duration,
    call_timeout: Duration,
}

impl Default for ProcessPluginFactory {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }
}

impl ProcessPluginFactory {
    pub fn new(handshake_timeout: Duration, call_timeout: Duration) -> Self {
        Self {
            handshake_timeout,
            call_timeout,
        }
    }
}

#[async_trait]
impl ExternalPluginFactory for ProcessPluginFactory {
    #[instrument(skip(self))]
    async fn resolve_plugin(
        &self,
        module_path: &str,
    ) -> Result<Box<dyn ProductLookupPlugin>, PluginLoadError> {
        let resolution_error = |message: String| PluginLoadError::ModuleResolution {
            module_path: module_path.to_string(),
            message,
        };

        let program = PathBuf::from(module_path);
        if !program.is_file() {
            return Err(resolution_error("no such file".to_string()));
        }

        let output = run_plugin_process(
            &program,
            "describe",
            None,
            self.handshake_timeout,
            &CancellationToken::new(),
        )
        .await
        .map_err(|e| resolution_error(format!("describe handshake failed: {}", e)))?;

        let description: PluginDescription = serde_json::from_slice(&output)
            .map_err(|e| resolution_error(format!("invalid describe response: {}", e)))?;
        if description.plugin_id.trim().is_empty() {
            return Err(resolution_error("describe response has an empty pluginId".to_string()));
        }

        info!(
            plugin_id = %description.plugin_id,
            mode = description.mode.as_str(),
            "Resolved external plugin"
        );
        Ok(Box::new(ProcessPlugin::new(program, description, self.call_timeout)))
    }
}

/// An external plugin driven through its executable.
pub struct ProcessPlugin {
    program: PathBuf,
    description: PluginDescription,
    config: Value,
    call_timeout: Duration,
}

impl ProcessPlugin {
    pub fn new(program: PathBuf, description: PluginDescription, call_timeout: Duration) -> Self {
        Self {
            program,
            description,
            config: Value::Null,
            call_timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Plugin for ProcessPlugin {
    fn plugin_id(&self) -> &str {
        &self.description.plugin_id
    }

    fn display_name(&self) -> &str {
        self.description
            .display_name
            .as_deref()
            .unwrap_or(&self.description.plugin_id)
    }

    fn version(&self) -> &str {
        self.description.version.as_deref().unwrap_or("unknown")
    }

    fn is_available(&self) -> bool {
        self.program.is_file()
    }

    async fn init(&mut self, config: &Value) -> PluginResult<()> {
        self.config = config.clone();
        Ok(())
    }
}

#[async_trait]
impl ProductLookupPlugin for ProcessPlugin {
    fn mode(&self) -> PluginMode {
        self.description.mode
    }

    #[instrument(skip(self, cancel), fields(plugin_id = %self.description.plugin_id))]
    async fn lookup(
        &self,
        query: &str,
        search_type: SearchType,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>> {
        let request = serde_json::to_vec(&LookupRequest {
            query,
            search_type,
            max_results,
            config: &self.config,
        })?;

        let output = run_plugin_process(
            &self.program,
            "lookup",
            Some(request),
            self.call_timeout,
            cancel,
        )
        .await?;

        let mut results: Vec<ProductLookupResult> = serde_json::from_slice(&output)
            .map_err(|e| PluginError::Protocol(format!("invalid lookup response: {}", e)))?;
        results.truncate(max_results);
        debug!("External plugin returned {} results", results.len());
        Ok(results)
    }
}

/// Spawn `program command`, feed it `input`, and collect stdout.
async fn run_plugin_process(
    program: &Path,
    command: &str,
    input: Option<Vec<u8>>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> PluginResult<Vec<u8>> {
    let mut child = Command::new(program)
        .arg(command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child.stdin.take();
    let exchange = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            // A plugin may exit without reading its request
            if let Err(e) = stdin.write_all(&input).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
        }
        child.wait_with_output().await
    };

    let output = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(PluginError::Cancelled),
        result = tokio::time::timeout(timeout, exchange) => match result {
            Ok(output) => output?,
            Err(_) => return Err(PluginError::Timeout(timeout.as_secs())),
        },
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail = match stderr.char_indices().rev().nth(499) {
            Some((start, _)) => &stderr[start..],
            None => stderr,
        };
        warn!(program = %program.display(), command, "External plugin exited with {}", output.status);
        return Err(PluginError::Protocol(format!(
            "{} {} exited with {}: {}",
            program.display(),
            command,
            output.status,
            tail
        )));
    }
    Ok(output.stdout)
}
