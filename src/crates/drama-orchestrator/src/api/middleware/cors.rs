//! CORS middleware configuration

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Permissive CORS for local front-ends
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

/// CORS restricted to the given origins; unparsable origins are skipped
pub fn cors_layer_restricted(allowed_origins: &[&str]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
