use crate::metrics::PrometheusMetrics;
use shorty_core::Shortener;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    metrics: Arc<PrometheusMetrics>,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>, metrics: Arc<PrometheusMetrics>) -> Self {
        Self { shortener, metrics }
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn metrics(&self) -> &PrometheusMetrics {
        &self.metrics
    }
}
