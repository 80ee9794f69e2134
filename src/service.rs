use crate::metrics::LookupMetrics;
use crate::pipeline::{PipelineContext, PipelineRunner, PluginExecution};
use crate::registry::PluginProvider;
use crate::types::{ProductLookupResult, SearchType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Everything a lookup produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub lookup_id: Uuid,
    pub query: String,
    pub search_type: SearchType,
    pub results: Vec<ProductLookupResult>,
    pub executions: Vec<PluginExecution>,
    pub completed_at: DateTime<Utc>,
}

/// Runs lookups against the provider's current plugin snapshot.
pub struct ProductLookupService {
    provider: Arc<PluginProvider>,
    runner: PipelineRunner,
    default_max_results: usize,
}

impl ProductLookupService {
    pub fn new(provider: Arc<PluginProvider>, default_max_results: usize) -> Self {
        Self {
            provider,
            runner: PipelineRunner::new(),
            default_max_results,
        }
    }

    pub fn provider(&self) -> &Arc<PluginProvider> {
        &self.provider
    }

    /// Look `query` up with every active plugin: lookup plugins first, then
    /// store plugins. Never fails; plugin errors show up in `executions`.
    ///
    /// The search type is detected from the query when not given.
    pub async fn lookup(
        &self,
        query: &str,
        search_type: Option<SearchType>,
        max_results: Option<usize>,
        cancel: &CancellationToken,
    ) -> LookupResponse {
        let lookup_id = Uuid::new_v4();
        let search_type = search_type.unwrap_or_else(|| SearchType::detect(query));
        let max_results = max_results.unwrap_or(self.default_max_results);
        let span = info_span!(
            "lookup",
            lookup_id = %lookup_id,
            query,
            search_type = search_type.as_str()
        );

        async move {
            let started = Instant::now();
            // Held for the whole query; a concurrent reload does not affect it.
            let snapshot = self.provider.snapshot();
            let plugins = snapshot.execution_order();

            let mut context = PipelineContext::new(query, search_type, max_results);
            let executions = self.runner.run(&plugins, &mut context, cancel).await;
            let results = context.into_results();

            let elapsed = started.elapsed();
            if cancel.is_cancelled() {
                LookupMetrics::record_cancelled();
            }
            LookupMetrics::record_lookup(search_type.as_str(), results.len(), elapsed.as_secs_f64());
            info!(
                results = results.len(),
                plugins = executions.len(),
                generation = snapshot.generation,
                elapsed_ms = elapsed.as_millis() as u64,
                "Lookup finished"
            );

            LookupResponse {
                lookup_id,
                query: query.to_string(),
                search_type,
                results,
                executions,
                completed_at: Utc::now(),
            }
        }
        .instrument(span)
        .await
    }
}
