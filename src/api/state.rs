//! Application state for Axum handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::service::AppServices;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Request pipeline over the service layer.
    pub pipeline: Pipeline<AppServices>,
    /// Prometheus renderer; `None` when metrics are disabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        services: AppServices,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config,
            pipeline: Pipeline::new(Arc::new(services)),
            metrics,
        }
    }

    /// Service layer, for handlers that bypass the pipeline.
    #[must_use]
    pub fn services(&self) -> &AppServices {
        self.pipeline.handlers()
    }
}
