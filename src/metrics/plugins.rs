//! Plugin metrics: snapshot loading and per-plugin executions.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct PluginMetrics;

impl PluginMetrics {
    pub fn record_load_success() {
        ::metrics::counter!(phase_metric!(counter, "plugins", "loads_success")).increment(1);
    }

    pub fn record_load_error() {
        ::metrics::counter!(phase_metric!(counter, "plugins", "loads_error")).increment(1);
    }

    /// The configuration document could not be read or parsed.
    pub fn record_config_error() {
        ::metrics::counter!(phase_metric!(counter, "plugins", "config_errors")).increment(1);
    }

    pub fn set_active_plugins(count: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "plugins", "active")).set(count as f64);
    }

    /// One plugin run inside a lookup. `outcome` is the execution outcome
    /// label (`completed`, `failed`, `cancelled`, `skipped`).
    pub fn record_execution(plugin_id: &str, outcome: &'static str, duration_secs: f64) {
        ::metrics::counter!(
            phase_metric!(counter, "plugins", "executions"),
            "plugin_id" => plugin_id.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        ::metrics::histogram!(
            phase_metric!(histogram, "plugins", "execution_duration_seconds"),
            "plugin_id" => plugin_id.to_string()
        )
        .record(duration_secs);
    }

    /// New entries a plugin created in the context.
    pub fn record_results_added(plugin_id: &str, added: usize) {
        ::metrics::counter!(
            phase_metric!(counter, "plugins", "results_added"),
            "plugin_id" => plugin_id.to_string()
        )
        .increment(added as u64);
    }
}

impl PhaseMetrics for PluginMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "plugins", "loads_success"));
        let _ = counter!(phase_metric!(counter, "plugins", "loads_error"));
        let _ = counter!(phase_metric!(counter, "plugins", "config_errors"));
        let _ = counter!(phase_metric!(counter, "plugins", "executions"));
        let _ = counter!(phase_metric!(counter, "plugins", "results_added"));
        let _ = gauge!(phase_metric!(gauge, "plugins", "active"));
        let _ = histogram!(phase_metric!(
            histogram,
            "plugins",
            "execution_duration_seconds"
        ));
    }

    fn phase_name() -> &'static str {
        "plugins"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "plugins", "loads_success"),
                metric_type: MetricType::Counter,
                help: "Plugins resolved and initialized into a snapshot",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "plugins", "loads_error"),
                metric_type: MetricType::Counter,
                help: "Enabled plugin descriptors that failed to resolve or initialize",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "plugins", "config_errors"),
                metric_type: MetricType::Counter,
                help: "Plugin configuration documents that could not be read",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "plugins", "executions"),
                metric_type: MetricType::Counter,
                help: "Plugin executions by outcome",
                labels: vec!["plugin_id", "outcome"],
            },
            MetricDoc {
                name: phase_metric!(counter, "plugins", "results_added"),
                metric_type: MetricType::Counter,
                help: "New result entries created by a plugin",
                labels: vec!["plugin_id"],
            },
            MetricDoc {
                name: phase_metric!(gauge, "plugins", "active"),
                metric_type: MetricType::Gauge,
                help: "Plugins in the current snapshot",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "plugins", "execution_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of one plugin execution",
                labels: vec!["plugin_id"],
            },
        ]
    }
}
