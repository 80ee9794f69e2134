use crate::metrics::PluginMetrics;
use crate::pipeline::context::PipelineContext;
use crate::plugins::{Plugin, PluginMode, ProductLookupPlugin};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How a single plugin run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum ExecutionOutcome {
    Completed,
    Failed(String),
    Cancelled,
    Skipped(String),
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Completed => "completed",
            ExecutionOutcome::Failed(_) => "failed",
            ExecutionOutcome::Cancelled => "cancelled",
            ExecutionOutcome::Skipped(_) => "skipped",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed)
    }
}

/// Report of one plugin's turn against the context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginExecution {
    pub plugin_id: String,
    pub mode: PluginMode,
    pub outcome: ExecutionOutcome,
    pub duration_ms: u64,
    pub results_before: usize,
    pub results_after: usize,
}

impl PluginExecution {
    fn skipped(plugin: &dyn ProductLookupPlugin, reason: &str, results: usize) -> Self {
        Self {
            plugin_id: plugin.plugin_id().to_string(),
            mode: plugin.mode(),
            outcome: ExecutionOutcome::Skipped(reason.to_string()),
            duration_ms: 0,
            results_before: results,
            results_after: results,
        }
    }
}

/// Runs plugins one after another against a single context.
///
/// A failing plugin never stops the run: its error is logged and recorded
/// and the next plugin starts. Once `cancel` fires, every plugin that has
/// not started yet is skipped and the partial results stay in the context.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineRunner;

impl PipelineRunner {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip_all, fields(query = %context.query(), search_type = %context.search_type()))]
    pub async fn run(
        &self,
        plugins: &[Arc<dyn ProductLookupPlugin>],
        context: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> Vec<PluginExecution> {
        let mut executions = Vec::with_capacity(plugins.len());

        for plugin in plugins {
            let plugin = plugin.as_ref();

            if cancel.is_cancelled() {
                debug!(plugin_id = plugin.plugin_id(), "Lookup cancelled, skipping plugin");
                let execution = PluginExecution::skipped(plugin, "cancelled", context.len());
                PluginMetrics::record_execution(plugin.plugin_id(), execution.outcome.as_str(), 0.0);
                executions.push(execution);
                continue;
            }

            if !plugin.is_available() {
                info!(plugin_id = plugin.plugin_id(), "Plugin unavailable, skipping");
                let execution = PluginExecution::skipped(plugin, "unavailable", context.len());
                PluginMetrics::record_execution(plugin.plugin_id(), execution.outcome.as_str(), 0.0);
                executions.push(execution);
                continue;
            }

            executions.push(run_plugin(plugin, context, cancel).await);
        }

        executions
    }
}

async fn run_plugin(
    plugin: &dyn ProductLookupPlugin,
    context: &mut PipelineContext,
    cancel: &CancellationToken,
) -> PluginExecution {
    let plugin_id = plugin.plugin_id();
    let mode = plugin.mode();
    let results_before = context.len();
    let started = Instant::now();

    debug!(plugin_id, mode = mode.as_str(), "Running plugin");
    let result = match mode {
        PluginMode::Source => {
            let looked_up = plugin
                .lookup(
                    context.query(),
                    context.search_type(),
                    context.max_results(),
                    cancel,
                )
                .await;
            looked_up.map(|results| {
                debug!(plugin_id, "Plugin returned {} results", results.len());
                plugin.enrich_pipeline(context, results);
            })
        }
        PluginMode::Enrichment => plugin.process_pipeline(context, cancel).await,
    };

    let elapsed = started.elapsed();
    let results_after = context.len();
    let outcome = match result {
        Ok(()) => ExecutionOutcome::Completed,
        Err(e) if e.is_cancelled() => {
            info!(plugin_id, "Plugin cancelled");
            ExecutionOutcome::Cancelled
        }
        Err(e) => {
            error!(plugin_id, mode = mode.as_str(), "Plugin failed: {}", e);
            ExecutionOutcome::Failed(e.to_string())
        }
    };

    if results_after < results_before {
        warn!(plugin_id, results_before, results_after, "Plugin removed results from the context");
    } else if results_after > results_before {
        PluginMetrics::record_results_added(plugin_id, results_after - results_before);
    }
    PluginMetrics::record_execution(plugin_id, outcome.as_str(), elapsed.as_secs_f64());

    PluginExecution {
        plugin_id: plugin_id.to_string(),
        mode,
        outcome,
        duration_ms: elapsed.as_millis() as u64,
        results_before,
        results_after,
    }
}
