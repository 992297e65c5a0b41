mod health;
mod metrics;
mod url;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use url::{create_url_handler, empty_code_handler, resolve_path_handler, resolve_url_handler};
