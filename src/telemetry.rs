//! Logging and metrics setup.

use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::ObservabilityConfig;

static PROMETHEUS: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Initialize logging based on configuration.
///
/// Later calls are ignored, so tests can build several apps per process.
pub fn init_logging(config: &ObservabilityConfig) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = if config.log_format == "json" {
        subscriber.with(fmt::layer().json()).try_init()
    } else {
        subscriber.with(fmt::layer()).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

/// Install the process-wide Prometheus recorder once and return its handle.
///
/// Returns `None` when metrics are disabled or another recorder is installed.
pub fn metrics_handle(config: &ObservabilityConfig) -> Option<PrometheusHandle> {
    if !config.metrics_enabled {
        return None;
    }

    PROMETHEUS
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "Prometheus recorder not installed");
                None
            }
        })
        .clone()
}
