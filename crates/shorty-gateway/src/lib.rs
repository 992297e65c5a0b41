//! HTTP gateway for the shorty mapping service.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod model;
pub mod state;
pub mod telemetry;

pub use app::App;
pub use config::Cli;
pub use metrics::PrometheusMetrics;
pub use state::AppState;
