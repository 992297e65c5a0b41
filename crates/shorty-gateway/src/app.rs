use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_url_handler, empty_code_handler, health_handler, metrics_handler, resolve_path_handler,
    resolve_url_handler,
};
use crate::state::AppState;

pub struct App;

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            // `-` is outside the code alphabet, so these never hide a short code.
            .route("/-/health", get(health_handler))
            .route("/-/metrics", get(metrics_handler))
            .route("/", get(empty_code_handler).post(create_url_handler))
            .route("/{code}", get(resolve_url_handler))
            .fallback(resolve_path_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
