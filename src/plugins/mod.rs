//! Plugin contract every data-source adapter implements.

use crate::error::PluginResult;
use crate::pipeline::context::{MergeOutcome, PipelineContext};
use crate::types::{ProductLookupResult, SearchType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod external;
pub mod http;
pub mod open_food_facts;
pub mod static_prices;
pub mod upcitemdb;

pub use external::{ExternalPluginFactory, ProcessPluginFactory};
pub use open_food_facts::OpenFoodFactsPlugin;
pub use static_prices::StaticPriceListPlugin;
pub use upcitemdb::UpcItemDbPlugin;

/// How a plugin interacts with the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginMode {
    /// Supplies a fresh batch via `lookup`, merged by `enrich_pipeline`.
    Source,
    /// Mutates existing context entries directly in `process_pipeline`.
    Enrichment,
}

impl PluginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginMode::Source => "source",
            PluginMode::Enrichment => "enrichment",
        }
    }
}

/// Identity, availability and initialization shared by all plugins.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn plugin_id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn version(&self) -> &str;

    /// Whether the plugin can run right now (configured, credentials present).
    fn is_available(&self) -> bool {
        true
    }

    /// Receives the opaque `config` blob of the plugin's descriptor.
    async fn init(&mut self, config: &serde_json::Value) -> PluginResult<()>;
}

#[async_trait]
pub trait ProductLookupPlugin: Plugin {
    fn mode(&self) -> PluginMode {
        PluginMode::Source
    }

    /// Query the plugin's own source.
    async fn lookup(
        &self,
        query: &str,
        search_type: SearchType,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> PluginResult<Vec<ProductLookupResult>>;

    /// Fold a batch returned by `lookup` into the context.
    fn enrich_pipeline(&self, context: &mut PipelineContext, results: Vec<ProductLookupResult>) {
        let plugin_id = self.plugin_id().to_string();
        for result in results {
            if context.merge_result(&plugin_id, result) == MergeOutcome::Dropped {
                debug!(plugin_id = %plugin_id, "Result dropped, context is full");
            }
        }
    }

    /// Enrichment-mode entry point: look up with the context's own query and
    /// update the entries that match. A new entry is only created when nothing
    /// matches and there is room left.
    async fn process_pipeline(
        &self,
        context: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> PluginResult<()> {
        let results = self
            .lookup(
                context.query(),
                context.search_type(),
                context.max_results(),
                cancel,
            )
            .await?;
        self.enrich_pipeline(context, results);
        Ok(())
    }
}
