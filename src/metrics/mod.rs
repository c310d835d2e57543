//! Metrics infrastructure for the pageviews pipeline
//!
//! Each pipeline stage records through [`stages::StageMetrics`]; names follow
//! `pageviews_{phase}_{metric_name}[_total]`.

pub mod registry;
pub mod stages;

pub use stages::StageMetrics;

use crate::constants::METRICS_ADDR_ENV;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Initialize the global metrics recorder
///
/// Idempotent. Serves `/metrics` over HTTP only when `PAGEVIEWS_METRICS_ADDR`
/// is set (requires a running tokio runtime); otherwise installs an in-process
/// recorder whose snapshot is available through [`render`].
pub fn init_metrics() {
    INIT.call_once(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

        let listen_addr = std::env::var(METRICS_ADDR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());

        if let Some(addr_str) = listen_addr {
            match addr_str.parse::<std::net::SocketAddr>() {
                Ok(addr) => match builder.with_http_listener(addr).install() {
                    Ok(()) => {
                        info!("Prometheus HTTP exporter started at http://{}/metrics", addr);
                        registry::register_all_metrics();
                    }
                    Err(e) => warn!("Failed to start Prometheus exporter: {}", e),
                },
                Err(_) => warn!("Invalid metrics addr '{}', metrics disabled", addr_str),
            }
            return;
        }

        match builder.install_recorder() {
            Ok(handle) => {
                let _ = HANDLE.set(handle);
                info!("Prometheus recorder installed (in-process rendering)");
                registry::register_all_metrics();
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Render the current metrics in Prometheus text format, if an in-process recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase so they appear before first use
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Build a metric name with the crate-wide prefix:
/// pageviews_{phase}_{metric_name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("pageviews_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("pageviews_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
