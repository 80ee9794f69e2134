//! Whole-lookup metrics.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct LookupMetrics;

impl LookupMetrics {
    pub fn record_lookup(search_type: &'static str, result_count: usize, duration_secs: f64) {
        ::metrics::counter!(
            phase_metric!(counter, "lookups", "requests"),
            "search_type" => search_type
        )
        .increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "lookups", "duration_seconds"))
            .record(duration_secs);
        ::metrics::histogram!(phase_metric!(histogram, "lookups", "result_count"))
            .record(result_count as f64);
        if result_count == 0 {
            ::metrics::counter!(phase_metric!(counter, "lookups", "empty")).increment(1);
        }
    }

    pub fn record_cancelled() {
        ::metrics::counter!(phase_metric!(counter, "lookups", "cancelled")).increment(1);
    }
}

impl PhaseMetrics for LookupMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "lookups", "requests"));
        let _ = counter!(phase_metric!(counter, "lookups", "empty"));
        let _ = counter!(phase_metric!(counter, "lookups", "cancelled"));
        let _ = histogram!(phase_metric!(histogram, "lookups", "duration_seconds"));
        let _ = histogram!(phase_metric!(histogram, "lookups", "result_count"));
    }

    fn phase_name() -> &'static str {
        "lookups"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "lookups", "requests"),
                metric_type: MetricType::Counter,
                help: "Lookups served",
                labels: vec!["search_type"],
            },
            MetricDoc {
                name: phase_metric!(counter, "lookups", "empty"),
                metric_type: MetricType::Counter,
                help: "Lookups that returned no results",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "lookups", "cancelled"),
                metric_type: MetricType::Counter,
                help: "Lookups cut short by cancellation",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "lookups", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of a whole lookup",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "lookups", "result_count"),
                metric_type: MetricType::Histogram,
                help: "Results returned per lookup",
                labels: vec![],
            },
        ]
    }
}
