//! Registration of every metrics area, with duplicate-name detection.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::plugins::PluginMetrics>(&mut all_metrics);
    register_phase_metrics::<super::lookups::LookupMetrics>(&mut all_metrics);

    info!("Registered {} metrics", all_metrics.len());
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if let Some(existing) = all_metrics.get(doc.name) {
            warn!(
                "Metric name conflict: '{}' registered by '{}' and again by '{}'",
                doc.name,
                extract_phase_from_metric_name(existing.name),
                phase_name
            );
            continue;
        }
        debug!(
            phase = phase_name,
            metric_type = ?doc.metric_type,
            labels = ?doc.labels,
            "{}: {}",
            doc.name,
            doc.help
        );
        all_metrics.insert(doc.name, doc);
    }
}

/// "product_lookup_plugins_loads_success_total" -> "plugins"
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("product_lookup_")
        .and_then(|rest| rest.split('_').next())
        .filter(|phase| !phase.is_empty())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{LookupMetrics, PluginMetrics};
    use std::collections::HashSet;

    #[test]
    fn test_extract_phase_from_metric_name() {
        assert_eq!(
            extract_phase_from_metric_name("product_lookup_plugins_loads_success_total"),
            "plugins"
        );
        assert_eq!(
            extract_phase_from_metric_name("product_lookup_lookups_duration_seconds"),
            "lookups"
        );
        assert_eq!(extract_phase_from_metric_name("invalid_metric_name"), "unknown");
    }

    #[test]
    fn test_documented_names_are_unique_and_prefixed() {
        let docs: Vec<MetricDoc> = PluginMetrics::metrics_documentation()
            .into_iter()
            .chain(LookupMetrics::metrics_documentation())
            .collect();
        let names: HashSet<&str> = docs.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), docs.len());
        for doc in &docs {
            let phase = extract_phase_from_metric_name(doc.name);
            assert!(phase == "plugins" || phase == "lookups", "{}", doc.name);
        }
    }
}
