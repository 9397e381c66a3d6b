use axum::http::{HeaderValue, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::routes::{health, jobs};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/jobs", jobs::router())
        .layer(ServiceBuilder::new().layer(cors_layer()))
        .with_state(state)
}

/// CORS policy: explicit origins from ALLOWED_ORIGINS (comma-separated), or
/// wide open for local development when unset.
fn cors_layer() -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            layer.allow_origin(origins)
        }
        Err(_) => layer.allow_origin(Any),
    }
}
