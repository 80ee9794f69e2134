//! Metrics for plugin loading, plugin execution and whole lookups.
//!
//! Each area defines its metrics in its own submodule and registers them
//! through [`registry::register_all_metrics`] so names are checked once at
//! startup.

pub mod lookups;
pub mod plugins;
pub mod registry;

pub use lookups::LookupMetrics;
pub use plugins::PluginMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder.
///
/// Idempotent. With `listen_addr` an HTTP exporter serves `/metrics` (this
/// needs a running tokio runtime); without it the recorder is installed for
/// in-process rendering only.
pub fn init_metrics(listen_addr: Option<SocketAddr>) {
    INIT.call_once(|| {
        let builder = PrometheusBuilder::new();
        let installed = match listen_addr {
            Some(addr) => builder.with_http_listener(addr).install().map(|()| {
                info!("Prometheus HTTP exporter started at http://{}/metrics", addr);
            }),
            None => builder.install_recorder().map(|handle| {
                let _ = HANDLE.set(handle);
                info!("Prometheus recorder installed for in-process rendering");
            }),
        };

        match installed {
            Ok(()) => registry::register_all_metrics(),
            Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
        }
    });
}

/// Render the current metrics in Prometheus text format, when the recorder
/// was installed without an HTTP listener.
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

/// Implemented by each metrics area.
pub trait PhaseMetrics {
    /// Pre-register every metric so it shows up before first use.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Builds metric names as `product_lookup_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("product_lookup_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("product_lookup_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("product_lookup_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
